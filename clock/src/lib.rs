pub mod clock {
    use std::cell::Cell;
    use std::rc::Rc;

    use anyhow::anyhow;
    use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
    use ds323x::ic::DS3231;
    use ds323x::interface::I2cInterface;
    use ds323x::{DateTimeAccess, Ds323x};
    use embedded_hal::i2c::I2c;

    /// Wall-clock source for the tracker. Times are local to the site.
    pub trait Clock {
        fn now(&mut self) -> anyhow::Result<NaiveDateTime>;
        fn adjust(&mut self, at: NaiveDateTime) -> anyhow::Result<()>;
    }

    /// Seconds since 1970 as a naive wall time, the form the companion app sends.
    pub fn from_timestamp(secs: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
    }

    pub fn to_timestamp(at: &NaiveDateTime) -> i64 {
        at.and_utc().timestamp()
    }

    pub const DS3231_ADDRESS: u8 = 0x68;

    /// DS3231 real-time clock on an I2C bus, keeping local wall time.
    pub struct Ds3231<I2C> {
        rtc: Ds323x<I2cInterface<I2C>, DS3231>,
    }

    impl<I2C: I2c> Ds3231<I2C> {
        pub fn new(i2c: I2C) -> Self {
            Ds3231 {
                rtc: Ds323x::new_ds3231(i2c),
            }
        }

        pub fn release(self) -> I2C {
            self.rtc.destroy_ds3231()
        }

        pub fn datetime(&mut self) -> Result<NaiveDateTime, ds323x::Error<I2C::Error>> {
            self.rtc.datetime()
        }

        /// Years 2000..=2100 only, the range the century bit can hold.
        pub fn set_datetime(
            &mut self,
            at: &NaiveDateTime,
        ) -> Result<(), ds323x::Error<I2C::Error>> {
            self.rtc.set_datetime(at)
        }
    }

    impl<I2C: I2c> Clock for Ds3231<I2C> {
        fn now(&mut self) -> anyhow::Result<NaiveDateTime> {
            self.datetime().map_err(|e| anyhow!("DS3231 read: {:?}", e))
        }

        fn adjust(&mut self, at: NaiveDateTime) -> anyhow::Result<()> {
            self.set_datetime(&at)
                .map_err(|e| anyhow!("DS3231 write: {:?}", e))?;
            log::info!("RTC set to {}", at.format("%d/%m/%Y %H:%M:%S"));
            Ok(())
        }
    }

    /// Host clock: system UTC shifted to the site's offset, plus any manual adjustment.
    pub struct SystemClock {
        utc_offset: TimeDelta,
        skew: TimeDelta,
    }

    impl SystemClock {
        pub fn new(utc_offset_hours: i32) -> Self {
            SystemClock {
                utc_offset: TimeDelta::hours(utc_offset_hours as i64),
                skew: TimeDelta::zero(),
            }
        }

        fn local(&self) -> NaiveDateTime {
            Utc::now().naive_utc() + self.utc_offset
        }
    }

    impl Clock for SystemClock {
        fn now(&mut self) -> anyhow::Result<NaiveDateTime> {
            Ok(self.local() + self.skew)
        }

        fn adjust(&mut self, at: NaiveDateTime) -> anyhow::Result<()> {
            self.skew = at - self.local();
            log::info!("Clock adjusted to {} (skew {}s)", at, self.skew.num_seconds());
            Ok(())
        }
    }

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Clone)]
    pub struct ManualClock {
        at: Rc<Cell<NaiveDateTime>>,
    }

    impl ManualClock {
        pub fn new(at: NaiveDateTime) -> Self {
            ManualClock {
                at: Rc::new(Cell::new(at)),
            }
        }

        pub fn set(&self, at: NaiveDateTime) {
            self.at.set(at);
        }

        pub fn advance(&self, by: TimeDelta) {
            self.at.set(self.at.get() + by);
        }

        pub fn get(&self) -> NaiveDateTime {
            self.at.get()
        }
    }

    impl Clock for ManualClock {
        fn now(&mut self) -> anyhow::Result<NaiveDateTime> {
            Ok(self.at.get())
        }

        fn adjust(&mut self, at: NaiveDateTime) -> anyhow::Result<()> {
            self.at.set(at);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::{NaiveDate, Timelike};
        use embedded_hal::i2c::ErrorKind;
        use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

        fn solstice_noon() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 6, 21)
                .unwrap()
                .and_hms_opt(12, 34, 56)
                .unwrap()
        }

        #[test]
        fn reads_bcd_registers() {
            let expectations = [Transaction::write_read(
                DS3231_ADDRESS,
                vec![0x00],
                vec![0x56, 0x34, 0x12, 0x06, 0x21, 0x06, 0x24],
            )];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            assert_eq!(rtc.now().unwrap(), solstice_noon());
            rtc.release().done();
        }

        #[test]
        fn reads_twelve_hour_mode() {
            let expectations = [Transaction::write_read(
                DS3231_ADDRESS,
                vec![0x00],
                vec![0x00, 0x00, 0x63, 0x01, 0x01, 0x01, 0x25],
            )];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            assert_eq!(rtc.datetime().unwrap().hour(), 15);
            rtc.release().done();
        }

        #[test]
        fn writes_bcd_registers() {
            let expectations = [Transaction::write(
                DS3231_ADDRESS,
                vec![0x00, 0x56, 0x34, 0x12, 0x06, 0x21, 0x06, 0x24],
            )];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            rtc.adjust(solstice_noon()).unwrap();
            rtc.release().done();
        }

        #[test]
        fn garbage_registers_are_an_error() {
            let expectations = [Transaction::write_read(
                DS3231_ADDRESS,
                vec![0x00],
                vec![0x00, 0x00, 0x00, 0x01, 0x31, 0x02, 0x24],
            )];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            assert!(matches!(
                rtc.datetime(),
                Err(ds323x::Error::InvalidDeviceState)
            ));
            rtc.release().done();
        }

        #[test]
        fn bus_errors_surface() {
            let expectations = [Transaction::write_read(
                DS3231_ADDRESS,
                vec![0x00],
                vec![0; 7],
            )
            .with_error(ErrorKind::Other)];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            assert!(rtc.now().is_err());
            rtc.release().done();
        }

        #[test]
        fn years_past_the_rtc_range_are_rejected() {
            let expectations: [Transaction; 0] = [];
            let mut rtc = Ds3231::new(I2cMock::new(&expectations));
            let at = NaiveDate::from_ymd_opt(2150, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            assert!(matches!(
                rtc.set_datetime(&at),
                Err(ds323x::Error::InvalidInputData)
            ));
            assert!(rtc.adjust(at).is_err());
            rtc.release().done();
        }

        #[test]
        fn manual_clock_clones_share_time() {
            let clock = ManualClock::new(solstice_noon());
            let mut handle = clock.clone();
            handle.adjust(solstice_noon() + TimeDelta::hours(1)).unwrap();
            assert_eq!(clock.get().hour(), 13);
            clock.advance(TimeDelta::minutes(30));
            assert_eq!(handle.now().unwrap().minute(), 4);
        }

        #[test]
        fn timestamps_round_trip_through_wall_time() {
            let at = from_timestamp(1_718_973_296).unwrap();
            assert_eq!(at, solstice_noon());
            assert_eq!(to_timestamp(&at), 1_718_973_296);
        }

        #[test]
        fn system_clock_adjust_applies_skew() {
            let mut clock = SystemClock::new(-5);
            clock.adjust(solstice_noon()).unwrap();
            let now = clock.now().unwrap();
            assert!((now - solstice_noon()).num_seconds().abs() <= 1);
        }
    }
}

pub use clock::{
    from_timestamp, to_timestamp, Clock, Ds3231, ManualClock, SystemClock, DS3231_ADDRESS,
};
