use std::time::Instant;

use actuator::{Actuator, ActuatorState, Calibration, SharedActuator};
use chrono::NaiveDateTime;
use clock::Clock;
use configuration::Configuration;
use link::Link;
use scheduler::{Schedule, Tickable};
use sun::Sun;

use crate::command::{Command, Jog, Request};
use crate::messages::{ConfigurationMessage, DateTimeMessage, Message, PositionMessage};
use crate::states::{Axis, TrackerState};
use crate::{DEFAULT_AZIMUTH, DEFAULT_ELEVATION, PENDING_RESET, TRACKING_INTERVAL};

/// Decides each tick where the two axes should point, and executes remote commands.
pub struct Tracker {
    config: Configuration,
    clock: Box<dyn Clock>,
    link: Box<dyn Link>,
    sun: Sun,
    azimuth: SharedActuator,
    elevation: SharedActuator,
    schedule: Schedule,
    stored: TrackerState,
    fault: Option<Axis>,
    broadcast: bool,
    waiting_for_morning: bool,
    cycle_hour: u32,
}

impl Tracker {
    pub fn new(
        config: Configuration,
        clock: Box<dyn Clock>,
        link: Box<dyn Link>,
        azimuth: SharedActuator,
        elevation: SharedActuator,
    ) -> Self {
        let sun = Sun::new(config.latitude(), config.longitude(), config.utc_offset());
        let mut schedule = Schedule::new(TRACKING_INTERVAL);
        schedule.disable();
        Tracker {
            config,
            clock,
            link,
            sun,
            azimuth,
            elevation,
            schedule,
            stored: TrackerState::Off,
            fault: None,
            broadcast: false,
            waiting_for_morning: false,
            cycle_hour: 0,
        }
    }

    /// Builds the sun oracle from configuration, references the actuators and
    /// enables the periodic tick. The tracker settles in Standby.
    pub fn initialize(&mut self) {
        self.rebuild_sun();
        match self.clock.now() {
            Ok(now) => {
                self.sun.calc(now);
            }
            Err(e) => log::warn!("Clock unavailable at startup: {:?}", e),
        }
        self.initialize_actuators();
        self.schedule.set_interval(TRACKING_INTERVAL);
        self.schedule.enable();
        self.set_state(TrackerState::Standby);
    }

    /// Observed state: stored state unless an actuator in use is referencing or faulted.
    pub fn state(&self) -> TrackerState {
        if self.stored == TrackerState::Off {
            return TrackerState::Off;
        }
        if self.fault.is_some() {
            return TrackerState::Initializing;
        }
        let busy = |state: ActuatorState| {
            matches!(state, ActuatorState::Initializing | ActuatorState::Error)
        };
        if busy(self.azimuth.borrow().state()) {
            return TrackerState::Initializing;
        }
        if self.config.is_dual() && busy(self.elevation.borrow().state()) {
            return TrackerState::Initializing;
        }
        self.stored
    }

    pub fn fault(&self) -> Option<Axis> {
        self.fault
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcast
    }

    pub fn is_waiting_for_morning(&self) -> bool {
        self.waiting_for_morning
    }

    pub fn sun(&self) -> &Sun {
        &self.sun
    }

    pub fn track(&mut self, now: Instant) {
        self.follow(TrackerState::Tracking, now);
    }

    pub fn cycle(&mut self, now: Instant) {
        self.follow(TrackerState::Cycling, now);
    }

    pub fn stop(&mut self) {
        if self.refuse_when_off("stop") {
            return;
        }
        self.set_state(TrackerState::Moving);
        self.azimuth.borrow_mut().stop();
        self.elevation.borrow_mut().stop();
    }

    /// Manual jog of one axis. Puts the tracker under manual control first.
    pub fn move_direction(&mut self, jog: Jog) {
        if self.refuse_when_off("move") {
            return;
        }
        self.set_state(TrackerState::Moving);
        match jog {
            Jog::East => self.azimuth.borrow_mut().move_in(),
            Jog::West => self.azimuth.borrow_mut().move_out(),
            Jog::Up | Jog::Down if !self.config.is_dual() => {
                log::warn!("Single axis rig, ignoring {:?}", jog);
            }
            Jog::Up => self.elevation.borrow_mut().move_out(),
            Jog::Down => self.elevation.borrow_mut().move_in(),
        }
    }

    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        self.config.set_location(latitude, longitude);
        self.pending_reset();
    }

    pub fn set_actuator_parameters(
        &mut self,
        azimuth_length: f32,
        elevation_length: f32,
        azimuth_speed: f32,
        elevation_speed: f32,
    ) {
        self.config.set_actuator_parameters(
            azimuth_length,
            elevation_length,
            azimuth_speed,
            elevation_speed,
        );
        self.pending_reset();
    }

    pub fn set_limits(&mut self, east: f32, west: f32, min: f32, max: f32) {
        self.config.set_limits(east, west, min, max);
        self.pending_reset();
    }

    pub fn set_options(&mut self, utc_offset: i32, dual: bool) {
        self.config.set_utc_offset(utc_offset);
        self.config.set_dual(dual);
        self.pending_reset();
    }

    pub fn set_date_time(&mut self, at: NaiveDateTime) {
        if let Err(e) = self.clock.adjust(at) {
            log::warn!("Failed to set clock: {:?}", e);
        }
    }

    pub fn send_configuration(&mut self) {
        let msg = ConfigurationMessage::new(&self.config, self.state());
        self.send(&msg);
    }

    pub fn send_date_time(&mut self) {
        match self.clock.now() {
            Ok(now) => self.send(&DateTimeMessage {
                dt: clock::to_timestamp(&now),
            }),
            Err(e) => log::warn!("Clock unavailable: {:?}", e),
        }
    }

    pub fn set_broadcast(&mut self, enabled: bool) {
        self.broadcast = enabled;
    }

    /// Parses and executes one inbound line. Bad input is logged and dropped.
    pub fn process_command(&mut self, line: &str, now: Instant) {
        let command = Command::parse(line);
        log::debug!("Command {}|{}", command.name, command.payload);
        match Request::try_from(&command) {
            Ok(request) => self.execute(request, now),
            Err(e) => log::warn!("Dropping command: {}", e),
        }
    }

    pub fn execute(&mut self, request: Request, now: Instant) {
        match request {
            Request::Track => self.track(now),
            Request::Cycle => self.cycle(now),
            Request::Stop => self.stop(),
            Request::GetConfiguration => self.send_configuration(),
            Request::GetDateTime => self.send_date_time(),
            Request::StartBroadcast => self.set_broadcast(true),
            Request::StopBroadcast => self.set_broadcast(false),
            Request::SetLocation {
                latitude,
                longitude,
            } => self.set_location(latitude, longitude),
            Request::SetActuatorParameters {
                azimuth_length,
                elevation_length,
                azimuth_speed,
                elevation_speed,
            } => self.set_actuator_parameters(
                azimuth_length,
                elevation_length,
                azimuth_speed,
                elevation_speed,
            ),
            Request::SetLimits {
                east,
                west,
                min,
                max,
            } => self.set_limits(east, west, min, max),
            Request::SetOptions { utc_offset, dual } => self.set_options(utc_offset, dual),
            Request::SetDateTime(at) => self.set_date_time(at),
            Request::MoveTo(jog) => self.move_direction(jog),
        }
    }

    fn refuse_when_off(&self, what: &str) -> bool {
        if self.stored == TrackerState::Off {
            log::warn!("Tracker is off, ignoring {}", what);
            return true;
        }
        false
    }

    fn follow(&mut self, target: TrackerState, now: Instant) {
        if self.refuse_when_off(target.name()) {
            return;
        }
        let recovering = self.fault.is_some() || self.live_fault().is_some();
        if recovering {
            log::info!("Re-initializing actuators to clear fault");
            self.fault = None;
            self.initialize_actuators();
            if let Some(axis) = self.detect_fault() {
                self.apply_fault_policy(axis);
                return;
            }
        } else {
            let state = self.state();
            if state == TrackerState::Initializing {
                log::warn!("Actuators still initializing, ignoring {}", target.name());
                return;
            }
            if target == TrackerState::Tracking
                && matches!(state, TrackerState::Moving | TrackerState::Cycling)
            {
                self.initialize_actuators();
            }
        }

        if target == TrackerState::Cycling {
            self.cycle_hour = 0;
        }
        self.schedule.enable();
        self.schedule.set_interval(target.interval());
        self.set_state(target);
        self.schedule.mark_ran(now);
        self.tick(now);
    }

    fn pending_reset(&mut self) {
        self.schedule.set_interval(PENDING_RESET);
    }

    fn set_state(&mut self, state: TrackerState) {
        if self.stored != state {
            log::info!("Tracker state {} -> {}", self.stored, state);
            self.stored = state;
            self.send_configuration();
        }
    }

    fn send<M: Message>(&mut self, msg: &M) {
        match msg.to_line() {
            Ok(line) => self.link.send(&line),
            Err(e) => log::warn!("Failed to encode {} message: {:?}", M::PREFIX, e),
        }
    }

    fn azimuth_calibration(&self) -> Calibration {
        let az = self.config.azimuth();
        Calibration::new(az.east, az.west, az.length, az.speed)
    }

    fn elevation_calibration(&self) -> Calibration {
        let el = self.config.elevation();
        Calibration::new(el.min, el.max, el.length, el.speed)
    }

    fn initialize_actuators(&mut self) {
        let az = self.azimuth_calibration();
        self.azimuth.borrow_mut().initialize(az);
        if self.config.is_dual() {
            let el = self.elevation_calibration();
            self.elevation.borrow_mut().initialize(el);
        }
    }

    fn rebuild_sun(&mut self) {
        self.sun = Sun::new(
            self.config.latitude(),
            self.config.longitude(),
            self.config.utc_offset(),
        );
    }

    fn apply_configuration(&mut self) {
        if let Err(e) = self.config.save() {
            log::warn!("Failed to save configuration: {:?}", e);
        }
        self.rebuild_sun();
        self.initialize_actuators();
        self.schedule.set_interval(self.stored.interval());
        log::info!("Configuration applied, {} resumes next tick", self.stored);
        self.send_configuration();
    }

    fn live_fault(&self) -> Option<Axis> {
        if self.azimuth.borrow().state().is_fault() {
            return Some(Axis::Azimuth);
        }
        if self.config.is_dual() && self.elevation.borrow().state().is_fault() {
            return Some(Axis::Elevation);
        }
        None
    }

    /// Latches the first faulted axis seen.
    fn detect_fault(&mut self) -> Option<Axis> {
        if self.fault.is_none() {
            if let Some(axis) = self.live_fault() {
                log::error!("{} actuator fault, moving to default position", axis);
                self.fault = Some(axis);
                self.send_configuration();
            }
        }
        self.fault
    }

    fn apply_fault_policy(&mut self, axis: Axis) {
        log::warn!(
            "Holding default orientation until re-initialized ({} fault)",
            axis
        );
        self.azimuth.borrow_mut().park_at(DEFAULT_AZIMUTH);
        if self.config.is_dual() {
            self.elevation.borrow_mut().park_at(DEFAULT_ELEVATION);
        }
        self.schedule.disable();
    }

    fn wait_for_morning(&mut self) {
        if self.waiting_for_morning {
            return;
        }
        self.azimuth.borrow_mut().retract();
        if self.config.is_dual() {
            self.elevation.borrow_mut().retract();
        }
        self.waiting_for_morning = true;
        log::info!("Waiting for morning");
    }

    fn track_to_sun(&mut self) {
        let dead_band = self.config.dead_band();
        let target = self.sun.position();

        let mut az = self.azimuth.borrow_mut();
        if (target.azimuth - az.current_angle()).abs() > dead_band {
            log::info!("Move azimuth to {:.1}°", target.azimuth);
            az.move_to(target.azimuth);
        }
        drop(az);

        if self.config.is_dual() {
            let mut el = self.elevation.borrow_mut();
            if (target.elevation - el.current_angle()).abs() > dead_band {
                log::info!("Move elevation to {:.1}°", target.elevation);
                el.move_to(target.elevation);
            }
        }
    }

    /// Wall time the sun is evaluated at, or `None` when this state does not follow it.
    fn evaluation_time(&mut self, state: TrackerState) -> Option<NaiveDateTime> {
        if !state.is_following() {
            return None;
        }
        let now = match self.clock.now() {
            Ok(now) => now,
            Err(e) => {
                log::warn!("Clock unavailable, skipping tick: {:?}", e);
                return None;
            }
        };
        if state == TrackerState::Tracking {
            return Some(now);
        }
        self.cycle_hour = (self.cycle_hour + 1) % 24;
        log::info!("Cycling hour {}", self.cycle_hour);
        now.date().and_hms_opt(self.cycle_hour, 0, 0)
    }

    fn evaluate(&mut self) {
        if self.config.is_dirty() {
            self.apply_configuration();
            return;
        }
        if let Some(axis) = self.detect_fault() {
            self.apply_fault_policy(axis);
            return;
        }
        let Some(at) = self.evaluation_time(self.state()) else {
            return;
        };
        if self.sun.calc(at).is_dark {
            self.wait_for_morning();
        } else {
            self.waiting_for_morning = false;
            self.track_to_sun();
        }
    }

    fn broadcast_position(&mut self) {
        if !self.broadcast {
            return;
        }
        let sun = self.sun.position();
        let msg = PositionMessage {
            tracker_az: self.azimuth.borrow().current_angle(),
            tracker_el: self.elevation.borrow().current_angle(),
            sun_az: sun.azimuth,
            sun_el: sun.elevation,
            is_dark: sun.is_dark,
            state: self.state().name(),
        };
        self.send(&msg);
    }
}

impl Tickable for Tracker {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn name(&self) -> &str {
        "tracker"
    }

    fn tick(&mut self, _now: Instant) {
        if self.stored == TrackerState::Off {
            return;
        }
        self.evaluate();
        self.broadcast_position();
    }
}
