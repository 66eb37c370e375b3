//=========================================================================
// Machine Registry
//=========================================================================
//
// Named state machines owned by the application context.
//
// Flow (once per frame):
//   poll_all()  → resume every suspended pipeline
//   update(dt)  → forward to each machine's current state behaviour
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::BTreeMap;

use log::{debug, error, warn};

//=== Internal Dependencies ===============================================

use super::machine::{Fired, StateMachine};

//=== MachineRegistry =====================================================

/// Keyed collection of [`StateMachine`]s, iterated in key order.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: BTreeMap<String, StateMachine>,
}

impl MachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the machine registered under `key`, creating it if needed.
    ///
    /// An empty key is a programming error: logged, `None` returned.
    pub fn get_or_create(&mut self, key: &str) -> Option<&mut StateMachine> {
        if key.is_empty() {
            error!("cannot register a state machine under an empty key");
            return None;
        }
        let machine = self.machines.entry(key.to_string()).or_insert_with(|| {
            debug!("created state machine '{}'", key);
            StateMachine::new(key)
        });
        Some(machine)
    }

    pub fn get(&self, key: &str) -> Option<&StateMachine> {
        self.machines.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut StateMachine> {
        self.machines.get_mut(key)
    }

    /// Removes and returns a machine. Its in-flight transition is dropped.
    pub fn remove(&mut self, key: &str) -> Option<StateMachine> {
        self.machines.remove(key)
    }

    pub fn clear(&mut self) {
        self.machines.clear();
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    /// Resumes every suspended machine.
    ///
    /// Returns how many machines settled (completed or cancelled) this
    /// call. Hook failures are logged and do not stop the sweep.
    pub fn poll_all(&mut self) -> usize {
        let mut settled = 0;
        for (key, machine) in self.machines.iter_mut() {
            match machine.poll() {
                None | Some(Ok(Fired::Suspended)) => {}
                Some(Ok(_)) => settled += 1,
                Some(Err(err)) => {
                    warn!("state machine '{}': {}", key, err);
                    settled += 1;
                }
            }
        }
        settled
    }

    /// Forwards a frame update to every machine.
    pub fn update(&mut self, dt: f32) {
        for machine in self.machines.values_mut() {
            machine.update(dt);
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
