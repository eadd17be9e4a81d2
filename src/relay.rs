//! Relay module to schedule a bank of relays over the day

use std::fmt;
use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::alarm::{format_minute, AlarmError, AlarmInterval, AlarmNumber, MINUTES_IN_DAY};
use crate::drive::RelayDrive;
use crate::RelayEvent;

/// One relay of the bank, with its output drive and its two alarm slots
#[derive(Debug)]
struct RelayEntry<D> {
    drive: D,
    state: bool,
    alarm1: Option<AlarmInterval>,
    alarm2: Option<AlarmInterval>,
}

impl<D> RelayEntry<D> {
    fn has_alarm(&self) -> bool {
        self.alarm1.is_some() || self.alarm2.is_some()
    }

    /// State the relay has to be in at the given minute
    fn target_state(&self, minute: u16) -> bool {
        self.alarm1.map_or(false, |alarm| alarm.contains(minute))
            || self.alarm2.map_or(false, |alarm| alarm.contains(minute))
    }
}

/// One boundary of the day, where a relay has to re-evaluate its state
#[derive(Debug, Copy, Clone)]
struct TimeMark {
    minute: u16,
    relay: usize,
}

/// Structure to schedule a bank of relays over the day
///
/// Each relay carries up to two daily `[start, end)` ON intervals. The bank
/// keeps every interval boundary in a list sorted over the day and walks it
/// with a cursor as the time updates come in.
///
/// ```
/// use rs_minuterie::alarm::AlarmNumber;
/// use rs_minuterie::drive::SoftDrive;
/// use rs_minuterie::relay::RelayBank;
///
/// // One relay ON between 8h00 and 10h30
/// let mut bank = RelayBank::new();
/// let id = bank.add(SoftDrive::default());
/// assert!(bank.add_alarm(id, AlarmNumber::One, 8 * 60, 10 * 60 + 30));
///
/// bank.update_time(9 * 60);
/// assert!(bank.state(id));
/// bank.update_time(10 * 60 + 30);
/// assert!(!bank.state(id));
/// ```
#[derive(Debug)]
pub struct RelayBank<D> {
    /// Relays in registration order, the index is the relay id
    relays: Vec<RelayEntry<D>>,
    /// Interval boundaries sorted over the day
    marks: Vec<TimeMark>,
    /// Position in `marks` of the next boundary to fire
    cursor: usize,
    /// Current minute of the day, `None` until the first update
    current: Option<u16>,
    /// Catch up the elapsed part of the day on the next update.
    /// Armed on construction and whenever the timeline is rebuilt.
    catch_up: bool,
    /// Number of relays currently ON
    on_count: usize,
}

impl<D> Default for RelayBank<D> {
    fn default() -> Self {
        RelayBank {
            relays: Vec::new(),
            marks: Vec::new(),
            cursor: 0,
            current: None,
            catch_up: true,
            on_count: 0,
        }
    }
}

impl<D: RelayDrive> RelayBank<D> {
    /// Method to create a new empty bank, relays are registered with [`add`](Self::add)
    pub fn new() -> RelayBank<D> {
        Default::default()
    }

    /// Method to create a bank from a batch of output drives
    pub fn from_drives<I: IntoIterator<Item = D>>(drives: I) -> RelayBank<D> {
        let mut bank = RelayBank::new();
        for drive in drives {
            bank.add(drive);
        }
        bank
    }

    /// Method to register a relay on the given output and return its id.
    /// The output is configured and left OFF.
    pub fn add(&mut self, mut drive: D) -> usize {
        drive.configure();
        self.relays.push(RelayEntry {
            drive,
            state: false,
            alarm1: None,
            alarm2: None,
        });
        self.relays.len() - 1
    }

    /// Getter of the number of registered relays
    pub fn len(&self) -> usize {
        self.relays.len()
    }

    /// Method to check if the bank has no relay
    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Setter of the relay state, ON (`true`) or OFF (`false`).
    /// Unknown ids and already applied states are ignored.
    pub fn set_state(&mut self, id: usize, on: bool) {
        let entry = match self.relays.get_mut(id) {
            Some(entry) => entry,
            None => return,
        };
        if entry.state == on {
            return;
        }
        entry.state = on;
        entry.drive.set(on);
        if on {
            self.on_count += 1;
        } else {
            self.on_count -= 1;
        }
        debug!("Relay {} switched {}", id, if on { "ON" } else { "OFF" });
    }

    /// Getter of the relay state, unknown ids read OFF
    pub fn state(&self, id: usize) -> bool {
        self.relays.get(id).map_or(false, |entry| entry.state)
    }

    /// Method to toggle the state of the relay
    pub fn toggle_state(&mut self, id: usize) {
        self.set_state(id, !self.state(id));
    }

    /// Method to check if at least one relay is ON
    pub fn any_on(&self) -> bool {
        self.on_count > 0
    }

    /// Getter of the state of all the relays, as a comma joined `ON`/`OFF` string
    pub fn all_states(&self) -> String {
        let mut states = String::new();
        for entry in &self.relays {
            if !states.is_empty() {
                states.push(',');
            }
            states.push_str(if entry.state { "ON" } else { "OFF" });
        }
        states
    }

    /// Method to replace one alarm slot of a relay with the `[start, end)`
    /// interval, in minutes of the day.
    ///
    /// `-1` opens a boundary (start at midnight or never end) and `(-1, -1)`
    /// clears the slot. The second alarm has to begin after the first one is
    /// over. On a rejected configuration the relay is left without any alarm
    /// and `false` is returned, so a schedule is never partially applied.
    pub fn add_alarm(&mut self, id: usize, number: AlarmNumber, start: i32, end: i32) -> bool {
        match self.check_alarm(id, number, start, end) {
            Ok(interval) => {
                let entry = &mut self.relays[id];
                match number {
                    AlarmNumber::One => entry.alarm1 = interval,
                    AlarmNumber::Two => entry.alarm2 = interval,
                }
                self.rebuild_marks();
                true
            }
            Err(err) => {
                if let Some(entry) = self.relays.get_mut(id) {
                    entry.alarm1 = None;
                    entry.alarm2 = None;
                    self.rebuild_marks();
                }
                warn!("Alarm {:?} rejected for relay {}: {}", number, id, err);
                false
            }
        }
    }

    /// Method to validate an alarm configuration without applying it
    fn check_alarm(
        &self,
        id: usize,
        number: AlarmNumber,
        start: i32,
        end: i32,
    ) -> Result<Option<AlarmInterval>, AlarmError> {
        let entry = self.relays.get(id).ok_or(AlarmError::UnknownRelay(id))?;
        let interval = AlarmInterval::from_minutes(start, end)?;

        // The second interval has to come after the first one when both are closed
        if let (AlarmNumber::Two, Some(interval)) = (number, interval) {
            if let Some(first_end) = entry.alarm1.and_then(|alarm| alarm.end().minute()) {
                if let Some(second_start) = interval.start().minute() {
                    if second_start <= first_end {
                        return Err(AlarmError::Overlap(second_start, first_end));
                    }
                }
            }
        }

        Ok(interval)
    }

    /// Getter of an alarm slot, `None` when the relay is unknown or the slot is empty
    pub fn alarm(&self, id: usize, number: AlarmNumber) -> Option<AlarmInterval> {
        let entry = self.relays.get(id)?;
        match number {
            AlarmNumber::One => entry.alarm1,
            AlarmNumber::Two => entry.alarm2,
        }
    }

    /// Method to check if the relay has at least one alarm set
    pub fn has_alarm(&self, id: usize) -> bool {
        self.relays.get(id).map_or(false, |entry| entry.has_alarm())
    }

    /// Method to check if at least one relay has an alarm set
    pub fn has_any_alarm(&self) -> bool {
        self.relays.iter().any(|entry| entry.has_alarm())
    }

    /// Method to rebuild the sorted boundary list out of every defined alarm.
    /// The cursor restarts from the beginning of the day and the next
    /// update re-seeks it, applying the new schedule on the way.
    fn rebuild_marks(&mut self) {
        self.marks.clear();
        self.cursor = 0;
        self.catch_up = true;

        for (id, entry) in self.relays.iter().enumerate() {
            for alarm in [entry.alarm1, entry.alarm2].into_iter().flatten() {
                if let Some(minute) = alarm.start().minute() {
                    self.marks.push(TimeMark { minute, relay: id });
                }
                if let Some(minute) = alarm.end().minute() {
                    self.marks.push(TimeMark { minute, relay: id });
                }
            }
        }

        // Stable sort, relays sharing a boundary keep their registration order
        self.marks.sort_by_key(|mark| mark.minute);
    }

    /// Method to update the current time, in minutes since midnight `[0, 1440)`.
    ///
    /// Call it at least once per minute: boundaries fire when an update lands
    /// exactly on them. The first update after a (re)configuration catches up
    /// every boundary already elapsed that day, so a relay inside one of its
    /// intervals powers ON right away. A minute lower than the previous one
    /// starts a new day. Out of day values and repeats of the current minute
    /// are ignored.
    pub fn update_time(&mut self, minute: u16) {
        if minute >= MINUTES_IN_DAY || self.current == Some(minute) {
            return;
        }
        self.advance(minute);
    }

    /// Method to advance the current time by one minute, for callers without
    /// a clock. Ignored until a first [`update_time`](Self::update_time) sets
    /// the day position.
    pub fn tick(&mut self) {
        if let Some(current) = self.current {
            self.advance(current.saturating_add(1));
        }
    }

    fn advance(&mut self, minute: u16) {
        let day_rolled = match self.current {
            Some(previous) => minute < previous,
            None => false,
        };
        self.current = Some(minute);

        if self.catch_up {
            // Apply every boundary already elapsed today, leaving the
            // cursor on the next one to fire
            self.cursor = 0;
            while self.cursor < self.marks.len() && self.marks[self.cursor].minute < minute {
                self.apply_mark(self.cursor, minute);
                self.cursor += 1;
            }
            self.catch_up = false;
        } else if day_rolled {
            self.cursor = 0;
        }

        // Fire every boundary landing exactly on this minute
        while self.cursor < self.marks.len() && self.marks[self.cursor].minute == minute {
            self.apply_mark(self.cursor, minute);
            self.cursor += 1;
        }
    }

    /// Re-evaluate the relay of one boundary against the current minute
    fn apply_mark(&mut self, index: usize, minute: u16) {
        let relay = self.marks[index].relay;
        let target = self.relays[relay].target_state(minute);
        self.set_state(relay, target);
    }

    fn snapshot(&self) -> Vec<bool> {
        self.relays.iter().map(|entry| entry.state).collect()
    }

    /// Relays whose state moved away from a snapshot, with their new state
    fn changed_states(&self, before: &[bool]) -> Vec<(usize, bool)> {
        let mut changes = Vec::new();
        for (id, previous) in before.iter().enumerate() {
            let state = self.state(id);
            if state != *previous {
                changes.push((id, state));
            }
        }
        changes
    }
}

impl<D: RelayDrive + Send + 'static> RelayBank<D> {
    /// Method to get a task driving the schedule from the wall clock
    ///
    /// The bank is moved into the task. Every `period` the minute of day is
    /// fed to [`update_time`](Self::update_time) (60 s keeps every boundary,
    /// shorter periods are harmless), and each relay transition is reported
    /// as a [`RelayEvent::StateChange`] on the event queue. The command
    /// channel keeps manual control over the moved bank.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use rs_minuterie::alarm::AlarmNumber;
    /// use rs_minuterie::drive::SoftDrive;
    /// use rs_minuterie::relay::{RelayBank, RelayCommand};
    /// use rs_minuterie::RelayEvent;
    /// use tokio::sync::mpsc;
    ///
    /// async fn run_schedule() {
    ///     let mut bank = RelayBank::new();
    ///     let heater = bank.add(SoftDrive::default());
    ///     assert!(bank.add_alarm(heater, AlarmNumber::One, 0, 7 * 60 + 30));
    ///
    ///     let (event_tx, mut event_rx) = mpsc::channel(16);
    ///     let (command_tx, command_rx) = mpsc::channel(16);
    ///     let _task = bank
    ///         .into_task(event_tx, command_rx, Duration::from_secs(60))
    ///         .await;
    ///
    ///     command_tx.send(RelayCommand::Toggle(heater)).await.unwrap();
    ///     if let Some(RelayEvent::StateChange(id, on)) = event_rx.recv().await {
    ///         println!("Relay {} is now {}", id, if on { "ON" } else { "OFF" });
    ///     }
    /// }
    /// ```
    pub async fn into_task(
        mut self,
        event_queue: mpsc::Sender<RelayEvent>,
        mut commands: mpsc::Receiver<RelayCommand>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut update_interval = interval(period);
            loop {
                // Relay states before handling, to report the transitions after
                let states = self.snapshot();
                tokio::select! {
                    Some(command) = commands.recv() => {
                        match command {
                            RelayCommand::SetState(id, on) if id < self.len() => {
                                self.set_state(id, on)
                            }
                            RelayCommand::Toggle(id) if id < self.len() => self.toggle_state(id),
                            RelayCommand::SetAlarm(id, number, start, end) => {
                                // Rejections are already reported on the log sink
                                let _ = self.add_alarm(id, number, start, end);
                            }
                            command => warn!("Command for an unknown relay: {:?}", command),
                        }
                    }
                    _ = update_interval.tick() => {
                        self.update_time(minute_of_day(&Local::now()));
                    }
                }
                for (id, state) in self.changed_states(&states) {
                    let _ = event_queue.send(RelayEvent::StateChange(id, state)).await;
                }
            }
        })
    }
}

impl<D> fmt::Display for RelayBank<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (id, entry) in self.relays.iter().enumerate() {
            write!(f, "Relay {} [{}]", id, if entry.state { "ON" } else { "OFF" })?;
            if let Some(alarm) = entry.alarm1 {
                write!(f, " alarm1: {}", alarm)?;
            }
            if let Some(alarm) = entry.alarm2 {
                write!(f, " alarm2: {}", alarm)?;
            }
            writeln!(f)?;
        }

        for (index, mark) in self.marks.iter().enumerate() {
            writeln!(
                f,
                "Mark {}: at {} relay {}",
                index,
                format_minute(mark.minute),
                mark.relay
            )?;
        }

        if self.marks.is_empty() {
            writeln!(f, "No alarm.")?;
        } else if let Some(current) = self.current {
            writeln!(f, "Current time = {}", format_minute(current))?;
            writeln!(f, "Current mark = {}", self.cursor)?;
        }

        Ok(())
    }
}

/// Function to get the minute of the day of a clock time, the value to feed
/// [`RelayBank::update_time`]
///
/// ```
/// use chrono::NaiveTime;
/// use rs_minuterie::relay::minute_of_day;
///
/// let time = NaiveTime::from_hms_opt(8, 5, 42).unwrap();
/// assert_eq!(485, minute_of_day(&time));
/// ```
pub fn minute_of_day<T: Timelike>(time: &T) -> u16 {
    (time.num_seconds_from_midnight() / 60) as u16
}

/// Enum that list all the commands accepted by the relay update task
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RelayCommand {
    /// Force a relay state (relay id, state)
    SetState(usize, bool),
    /// Toggle a relay (relay id)
    Toggle(usize),
    /// Replace an alarm slot (relay id, slot, start and end minutes, `-1` opens a boundary)
    SetAlarm(usize, AlarmNumber, i32, i32),
}
