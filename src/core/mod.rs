//=========================================================================
// Core Systems
//=========================================================================
//
// Framework subsystems, independent of any concrete engine.
//
// Architecture:
//   value      ─ ArgValue, the dynamic argument type shared by all systems
//   assets     ─ loader / asset contracts and reference bookkeeping
//   event_bus  ─ priority-ordered name-keyed notifications
//   fsm        ─ named-transition state machines
//   ui         ─ per-scene UI stack manager
//
//=========================================================================

pub mod assets;
pub mod event_bus;
pub mod fsm;
pub mod ui;
pub mod value;
