pub mod scheduler {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use heapless::Vec;

    /// Upper bound on registered tasks. Two actuators plus the tracker fit with room to spare.
    pub const MAX_TASKS: usize = 8;

    /// Timing state owned by each tickable object.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Schedule {
        interval: Duration,
        enabled: bool,
        last_run: Option<Instant>,
    }

    impl Schedule {
        pub fn new(interval: Duration) -> Self {
            Schedule {
                interval,
                enabled: true,
                last_run: None,
            }
        }

        pub fn interval(&self) -> Duration {
            self.interval
        }

        pub fn set_interval(&mut self, interval: Duration) {
            self.interval = interval;
        }

        pub fn enabled(&self) -> bool {
            self.enabled
        }

        pub fn enable(&mut self) {
            self.enabled = true;
        }

        pub fn disable(&mut self) {
            self.enabled = false;
        }

        pub fn last_run(&self) -> Option<Instant> {
            self.last_run
        }

        /// Earliest instant the owner should tick again. `None` means immediately.
        pub fn next_due(&self) -> Option<Instant> {
            self.last_run.map(|last| last + self.interval)
        }

        pub fn is_due(&self, now: Instant) -> bool {
            self.enabled && self.next_due().map_or(true, |due| now >= due)
        }

        pub fn mark_ran(&mut self, now: Instant) {
            self.last_run = Some(now);
        }
    }

    /// An object the scheduler can pump. `tick` must return promptly.
    pub trait Tickable {
        fn schedule(&self) -> &Schedule;
        fn schedule_mut(&mut self) -> &mut Schedule;
        fn tick(&mut self, now: Instant);

        fn name(&self) -> &str {
            "task"
        }
    }

    pub type Task = Rc<RefCell<dyn Tickable>>;

    #[derive(Debug, thiserror::Error, PartialEq)]
    pub enum SchedulerError {
        #[error("scheduler is full ({0} tasks)")]
        Full(usize),
    }

    /// Cooperative single-loop runner. Holds shared handles to its tasks and never
    /// allocates after startup.
    pub struct Scheduler {
        tasks: Vec<Task, MAX_TASKS>,
    }

    impl Default for Scheduler {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Scheduler {
        pub fn new() -> Self {
            Scheduler { tasks: Vec::new() }
        }

        pub fn add(&mut self, task: Task) -> Result<(), SchedulerError> {
            let name = task.borrow().name().to_string();
            self.tasks
                .push(task)
                .map_err(|_| SchedulerError::Full(MAX_TASKS))?;
            log::info!("Scheduler: registered {} ({} tasks)", name, self.tasks.len());
            Ok(())
        }

        pub fn len(&self) -> usize {
            self.tasks.len()
        }

        pub fn is_empty(&self) -> bool {
            self.tasks.is_empty()
        }

        /// One pump cycle. Ticks every enabled task whose interval has elapsed and
        /// returns how many fired.
        pub fn run(&mut self, now: Instant) -> usize {
            let mut fired = 0;
            for task in self.tasks.iter() {
                let mut task = task.borrow_mut();
                if !task.schedule().is_due(now) {
                    continue;
                }
                task.schedule_mut().mark_ran(now);
                task.tick(now);
                fired += 1;
            }
            fired
        }
    }

}

pub use scheduler::{Schedule, Scheduler, SchedulerError, Task, Tickable, MAX_TASKS};
