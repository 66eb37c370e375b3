//=========================================================================
// Aetheric UI - Library Root
//
// UI stack management, a named-transition state machine engine and an
// event bus for Aetheric game clients.
//
// Responsibilities:
// - Open, stack, cache and close UI screens per scene (`core::ui`)
// - Drive finite state machines with lifecycle hooks (`core::fsm`)
// - Route name-keyed notifications between systems (`core::event_bus`)
// - Tie the three together per running client (`AppContext`)
//
// Typical usage:
// ```no_run
// use aetheric_ui::prelude::*;
//
// let mut app = AppContextBuilder::new()
//     .with_ui_config(UiConfig::load_from_file("ui.toml")?)
//     .build(|scene| make_backend(scene));
// app.enter_scene("main").open(1, Vec::new(), None)?;
// loop { app.update(dt); }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds every subsystem. Engine integrations implement the
// contracts in `core::assets` and `core::ui` (loader, view factory,
// canvas, animator).
//
pub mod core;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------

mod context;

//--- Public Exports ------------------------------------------------------

pub use context::{
    AppContext, AppContextBuilder, BackendFactory, SCENE_BEFORE_LAUNCH, UI_BEFORE_OPEN, UI_CLOSED,
    UI_OPENED,
};
