pub mod sun {
    use astronav::coords::noaa_sun::NOAASun;
    use chrono::{Datelike, NaiveDateTime, Timelike};

    /// Sun altitude at sunrise/sunset, refraction and solar radius included.
    pub const DARK_ELEVATION: f32 = -0.833;

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub struct SunPosition {
        /// Degrees clockwise from north.
        pub azimuth: f32,
        /// Degrees above the horizon, geometric.
        pub elevation: f32,
        pub is_dark: bool,
    }

    /// Sun position for one site. Rebuilt, not mutated, when the site moves.
    #[derive(Debug, Clone)]
    pub struct Sun {
        latitude: f64,
        longitude: f64,
        utc_offset: i32,
        position: SunPosition,
    }

    impl Sun {
        /// `longitude` is east-positive, `utc_offset` in whole hours.
        pub fn new(latitude: f64, longitude: f64, utc_offset: i32) -> Self {
            log::debug!(
                "Sun oracle for lat {:.4}, lon {:.4}, UTC{:+}",
                latitude,
                longitude,
                utc_offset
            );
            Sun {
                latitude,
                longitude,
                utc_offset,
                position: SunPosition::default(),
            }
        }

        /// Recompute for a local wall time at the site.
        pub fn calc(&mut self, local: NaiveDateTime) -> SunPosition {
            let sun = NOAASun {
                year: local.year().clamp(0, u16::MAX as i32) as u16,
                doy: local.ordinal() as u16,
                long: self.longitude as f32,
                lat: self.latitude as f32,
                timezone: self.utc_offset as f32,
                hour: local.hour() as u8,
                min: local.minute() as u8,
                sec: local.second() as u8,
            };

            let elevation = sun.altitude_in_deg();
            let azimuth = sun.azimuth_in_deg();
            if !(elevation.is_finite() && azimuth.is_finite()) {
                // Sun straight overhead or underfoot, azimuth is undefined there.
                log::debug!("Sun position undefined at {}, keeping the last one", local);
                return self.position;
            }
            let elevation = elevation as f32;
            self.position = SunPosition {
                azimuth: azimuth as f32,
                elevation,
                is_dark: elevation < DARK_ELEVATION,
            };
            self.position
        }

        pub fn position(&self) -> SunPosition {
            self.position
        }

        pub fn azimuth(&self) -> f32 {
            self.position.azimuth
        }

        pub fn elevation(&self) -> f32 {
            self.position.elevation
        }

        pub fn is_dark(&self) -> bool {
            self.position.is_dark
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap()
        }

        #[test]
        fn summer_solstice_noon_is_high_and_south() {
            let mut sun = Sun::new(45.0, -75.0, -5);
            let pos = sun.calc(local(2024, 6, 21, 12, 0));
            assert!((170.0..190.0).contains(&pos.azimuth), "az {}", pos.azimuth);
            assert!((65.0..72.0).contains(&pos.elevation), "el {}", pos.elevation);
            assert!(!pos.is_dark);
            assert_eq!(sun.position(), pos);
        }

        #[test]
        fn midnight_is_dark() {
            let mut sun = Sun::new(45.0, -75.0, -5);
            sun.calc(local(2024, 6, 21, 0, 0));
            assert!(sun.is_dark());
            assert!(sun.elevation() < -15.0);
        }

        #[test]
        fn winter_morning_rises_in_the_southeast() {
            let mut sun = Sun::new(45.0, -75.0, -5);
            sun.calc(local(2024, 12, 21, 7, 0));
            assert!(sun.is_dark());

            sun.calc(local(2024, 12, 21, 9, 0));
            assert!(!sun.is_dark());
            assert!((125.0..150.0).contains(&sun.azimuth()), "az {}", sun.azimuth());
            assert!((5.0..15.0).contains(&sun.elevation()), "el {}", sun.elevation());
        }

        #[test]
        fn afternoon_is_west_of_south() {
            let mut sun = Sun::new(45.936527, -75.091259, -5);
            sun.calc(local(2024, 9, 22, 16, 0));
            assert!(sun.azimuth() > 200.0 && sun.azimuth() < 270.0);
        }

        #[test]
        fn site_offset_shifts_local_noon() {
            // The same instant reads an hour later on a clock one zone further east.
            let mut standard = Sun::new(45.0, -75.0, -5);
            let mut daylight = Sun::new(45.0, -75.0, -4);
            let a = standard.calc(local(2024, 6, 21, 12, 0));
            let b = daylight.calc(local(2024, 6, 21, 13, 0));
            assert!((a.azimuth - b.azimuth).abs() < 1.0, "{} vs {}", a.azimuth, b.azimuth);
            assert!((a.elevation - b.elevation).abs() < 1.0);
        }
    }
}

pub use sun::{Sun, SunPosition, DARK_ELEVATION};
