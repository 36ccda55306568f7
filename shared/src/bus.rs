//! Typed publish/subscribe bus
//!
//! Tasks never share mutable structures; they exchange complete record
//! snapshots over topics. A [`Topic`] is a latest-value slot with a
//! per-topic generation counter, so a subscriber can tell when it missed
//! intermediate generations. A [`CommandQueue`] is a bounded FIFO for
//! records that must not be collapsed (commands, acknowledgements,
//! events). All publishes draw from one bus-wide sequence counter, which
//! makes the publication order within a tick observable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::command::{ActionRequest, CommandAck, VehicleCommand};
use crate::events::{Event, LedControl, TuneControl};
use crate::mission::{MissionPlan, MissionResult};
use crate::params::Parameters;
use crate::sensors::{
    AttitudeSample, BatteryStatus, CpuLoad, EscStatus, GlobalPosition, GpsPosition, LandDetected,
    LocalPosition, ManualControl, OffboardControlMode, PowerButtonEvent, SafetySwitch, SystemPower,
    TelemetryHeartbeat, TransponderReport, VibrationMetrics, VtolStatus, WindSample,
};
use crate::setpoint::{PositionSetpointTriplet, VehicleRoi};
use crate::status::{
    ActuatorArmed, CommanderState, FailureFlags, GeofenceResult, HomePosition, StatusFlags,
    VehicleControlMode, VehicleStatus,
};

/// Default capacity for command queues
const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// The bus owning the publish sequence counter
#[derive(Debug, Clone, Default)]
pub struct Bus {
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Create a bus with a fresh sequence counter
    pub fn new() -> Self {
        Self {
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a latest-value topic on this bus
    pub fn topic<T: Clone>(&self) -> Topic<T> {
        Topic {
            shared: Arc::new(TopicShared {
                slot: Mutex::new(Slot {
                    value: None,
                    generation: 0,
                    publish_seq: 0,
                }),
                seq: Arc::clone(&self.seq),
            }),
        }
    }

    /// Create a bounded FIFO queue on this bus
    pub fn queue<T>(&self, capacity: usize) -> CommandQueue<T> {
        CommandQueue {
            shared: Arc::new(QueueShared {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                dropped: AtomicU64::new(0),
            }),
        }
    }
}

struct Slot<T> {
    value: Option<T>,
    generation: u64,
    publish_seq: u64,
}

struct TopicShared<T> {
    slot: Mutex<Slot<T>>,
    seq: Arc<AtomicU64>,
}

/// A latest-value topic handle
///
/// Cloning the handle yields another producer/reader of the same topic.
pub struct Topic<T: Clone> {
    shared: Arc<TopicShared<T>>,
}

impl<T: Clone> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic").finish_non_exhaustive()
    }
}

impl<T: Clone> Topic<T> {
    /// Publish a new record, replacing the previous one
    pub fn publish(&self, value: T) {
        let seq = self.shared.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slot = self.shared.slot.lock().expect("topic lock poisoned");
        slot.value = Some(value);
        slot.generation += 1;
        slot.publish_seq = seq;
    }

    /// Copy of the latest record, if any was ever published
    pub fn latest(&self) -> Option<T> {
        self.shared
            .slot
            .lock()
            .expect("topic lock poisoned")
            .value
            .clone()
    }

    /// Bus-wide sequence number of the last publish (0 when never published)
    pub fn publish_seq(&self) -> u64 {
        self.shared
            .slot
            .lock()
            .expect("topic lock poisoned")
            .publish_seq
    }

    /// Create a subscription starting before the first generation
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            shared: Arc::clone(&self.shared),
            seen_generation: 0,
            missed: 0,
        }
    }
}

/// A consumer-side cursor over a topic
pub struct Subscription<T: Clone> {
    shared: Arc<TopicShared<T>>,
    seen_generation: u64,
    missed: u64,
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("seen_generation", &self.seen_generation)
            .field("missed", &self.missed)
            .finish()
    }
}

impl<T: Clone> Subscription<T> {
    /// The latest record if a new generation was published since the
    /// last call; accumulates the count of skipped generations
    pub fn updated(&mut self) -> Option<T> {
        let slot = self.shared.slot.lock().expect("topic lock poisoned");
        if slot.generation > self.seen_generation {
            let skipped = slot.generation - self.seen_generation - 1;
            if skipped > 0 {
                self.missed += skipped;
                tracing::trace!(skipped, "subscription missed generations");
            }
            self.seen_generation = slot.generation;
            slot.value.clone()
        } else {
            None
        }
    }

    /// Copy of the latest record without advancing the cursor
    pub fn latest(&self) -> Option<T> {
        self.shared
            .slot
            .lock()
            .expect("topic lock poisoned")
            .value
            .clone()
    }

    /// Total generations this subscription never observed
    pub fn missed_total(&self) -> u64 {
        self.missed
    }
}

struct QueueShared<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
}

/// A bounded many-producer FIFO with a single consumer by convention
pub struct CommandQueue<T> {
    shared: Arc<QueueShared<T>>,
}

impl<T> Clone for CommandQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for CommandQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> CommandQueue<T> {
    /// Enqueue a record; a full queue drops it and counts the loss
    pub fn push(&self, item: T) -> bool {
        let mut items = self.shared.items.lock().expect("queue lock poisoned");
        if items.len() >= self.shared.capacity {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            items.push_back(item);
            true
        }
    }

    /// Dequeue the oldest record
    pub fn pop(&self) -> Option<T> {
        self.shared
            .items
            .lock()
            .expect("queue lock poisoned")
            .pop_front()
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.shared.items.lock().expect("queue lock poisoned").len()
    }

    /// Whether no records are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Lock-free queue for the power-button interrupt context
///
/// The interrupt-side handle only enqueues a minimal event record; the
/// commander drains the queue once per tick. The queue never allocates.
#[derive(Clone)]
pub struct PowerButtonQueue {
    queue: Arc<heapless::mpmc::Q8<PowerButtonEvent>>,
}

impl std::fmt::Debug for PowerButtonQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerButtonQueue").finish_non_exhaustive()
    }
}

impl PowerButtonQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            queue: Arc::new(heapless::mpmc::Q8::new()),
        }
    }

    /// Enqueue an event; a full queue drops it
    pub fn push(&self, event: PowerButtonEvent) -> bool {
        self.queue.enqueue(event).is_ok()
    }

    /// Dequeue the oldest event
    pub fn pop(&self) -> Option<PowerButtonEvent> {
        self.queue.dequeue()
    }
}

impl Default for PowerButtonQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// All topics and queues of one vehicle, created by the composition root
///
/// The commander and navigator each clone the handles they need; nothing
/// reaches for a global.
#[derive(Debug, Clone)]
pub struct FlightBus {
    /// The underlying bus with the shared publish sequence
    pub bus: Bus,

    // Command-flavoured queues
    /// Commands addressed to the supervisory core
    pub vehicle_command: CommandQueue<VehicleCommand>,
    /// Commands the commander forwards to the navigator
    pub navigator_command: CommandQueue<VehicleCommand>,
    /// Commands re-emitted towards external components (parachute)
    pub command_out: CommandQueue<VehicleCommand>,
    /// Operator action requests
    pub action_request: CommandQueue<ActionRequest>,
    /// Command acknowledgements
    pub command_ack: CommandQueue<CommandAck>,
    /// Structured operator events
    pub events: CommandQueue<Event>,
    /// Acoustic cues
    pub tune_control: CommandQueue<TuneControl>,
    /// Telemetry link heartbeats
    pub telemetry_heartbeat: CommandQueue<TelemetryHeartbeat>,
    /// Nearby traffic reports
    pub transponder_report: CommandQueue<TransponderReport>,
    /// Power-button events from interrupt context
    pub power_button: PowerButtonQueue,

    // Input topics
    /// Land detector output
    pub land_detected: Topic<LandDetected>,
    /// Local position estimate
    pub local_position: Topic<LocalPosition>,
    /// Global position estimate
    pub global_position: Topic<GlobalPosition>,
    /// Raw GNSS fix
    pub gps_position: Topic<GpsPosition>,
    /// Operator stick positions
    pub manual_control: Topic<ManualControl>,
    /// Attitude estimate
    pub attitude: Topic<AttitudeSample>,
    /// ESC driver status
    pub esc_status: Topic<EscStatus>,
    /// Airframe vibration summary
    pub vibration: Topic<VibrationMetrics>,
    /// Offboard setpoint stream descriptor
    pub offboard_control_mode: Topic<OffboardControlMode>,
    /// VTOL transition status
    pub vtol_status: Topic<VtolStatus>,
    /// Wind estimate
    pub wind: Topic<WindSample>,
    /// Battery state
    pub battery_status: Topic<BatteryStatus>,
    /// Processor load
    pub cpu_load: Topic<CpuLoad>,
    /// Board power status
    pub system_power: Topic<SystemPower>,
    /// Safety switch state
    pub safety: Topic<SafetySwitch>,
    /// Uploaded mission plan
    pub mission_plan: Topic<MissionPlan>,
    /// Parameter snapshot updates
    pub parameter_update: Topic<Parameters>,

    // Output topics
    /// Supervisory vehicle status
    pub vehicle_status: Topic<VehicleStatus>,
    /// Pre-flight and runtime flags
    pub status_flags: Topic<StatusFlags>,
    /// Motor-enablement record
    pub actuator_armed: Topic<ActuatorArmed>,
    /// Enabled control loops
    pub control_mode: Topic<VehicleControlMode>,
    /// Operator mode-selection state
    pub commander_state: Topic<CommanderState>,
    /// Failure detector flags
    pub failure_flags: Topic<FailureFlags>,
    /// Home reference position
    pub home_position: Topic<HomePosition>,
    /// Geofence monitor verdict
    pub geofence_result: Topic<GeofenceResult>,
    /// Mission execution progress
    pub mission_result: Topic<MissionResult>,
    /// Setpoints for the position controller
    pub position_setpoint_triplet: Topic<PositionSetpointTriplet>,
    /// Region-of-interest pointing target
    pub vehicle_roi: Topic<VehicleRoi>,
    /// LED state
    pub led_control: Topic<LedControl>,
}

impl FlightBus {
    /// Create every topic and queue of one vehicle
    pub fn new() -> Self {
        let bus = Bus::new();
        Self {
            vehicle_command: bus.queue(DEFAULT_QUEUE_CAPACITY),
            navigator_command: bus.queue(DEFAULT_QUEUE_CAPACITY),
            command_out: bus.queue(DEFAULT_QUEUE_CAPACITY),
            action_request: bus.queue(DEFAULT_QUEUE_CAPACITY),
            command_ack: bus.queue(DEFAULT_QUEUE_CAPACITY),
            events: bus.queue(64),
            tune_control: bus.queue(DEFAULT_QUEUE_CAPACITY),
            telemetry_heartbeat: bus.queue(64),
            transponder_report: bus.queue(DEFAULT_QUEUE_CAPACITY),
            power_button: PowerButtonQueue::new(),
            land_detected: bus.topic(),
            local_position: bus.topic(),
            global_position: bus.topic(),
            gps_position: bus.topic(),
            manual_control: bus.topic(),
            attitude: bus.topic(),
            esc_status: bus.topic(),
            vibration: bus.topic(),
            offboard_control_mode: bus.topic(),
            vtol_status: bus.topic(),
            wind: bus.topic(),
            battery_status: bus.topic(),
            cpu_load: bus.topic(),
            system_power: bus.topic(),
            safety: bus.topic(),
            mission_plan: bus.topic(),
            parameter_update: bus.topic(),
            vehicle_status: bus.topic(),
            status_flags: bus.topic(),
            actuator_armed: bus.topic(),
            control_mode: bus.topic(),
            commander_state: bus.topic(),
            failure_flags: bus.topic(),
            home_position: bus.topic(),
            geofence_result: bus.topic(),
            mission_result: bus.topic(),
            position_setpoint_triplet: bus.topic(),
            vehicle_roi: bus.topic(),
            led_control: bus.topic(),
            bus,
        }
    }
}

impl Default for FlightBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_sees_only_new_generations() {
        let bus = Bus::new();
        let topic: Topic<u32> = bus.topic();
        let mut sub = topic.subscribe();

        assert_eq!(sub.updated(), None);
        topic.publish(1);
        assert_eq!(sub.updated(), Some(1));
        assert_eq!(sub.updated(), None);
        topic.publish(2);
        topic.publish(3);
        assert_eq!(sub.updated(), Some(3));
        assert_eq!(sub.missed_total(), 1);
    }

    #[test]
    fn publish_seq_orders_across_topics() {
        let bus = Bus::new();
        let a: Topic<u8> = bus.topic();
        let b: Topic<u8> = bus.topic();
        a.publish(0);
        b.publish(0);
        assert!(a.publish_seq() < b.publish_seq());
        a.publish(1);
        assert!(a.publish_seq() > b.publish_seq());
    }

    #[test]
    fn queue_is_fifo_and_bounded() {
        let bus = Bus::new();
        let queue: CommandQueue<u32> = bus.queue(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn power_button_queue_round_trips() {
        let queue = PowerButtonQueue::new();
        assert!(queue.push(PowerButtonEvent::ShutdownRequest));
        assert_eq!(queue.pop(), Some(PowerButtonEvent::ShutdownRequest));
        assert_eq!(queue.pop(), None);
    }
}
