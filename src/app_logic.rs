/*
 * This module provides the application logic layer, centered around
 * `TaskManagerAppLogic`, which acts as the Presenter. Around it sit the route
 * table and guard (`router`), the presentation-side navigation state
 * (`navigation_state`), and the reports view model (`reports_view`).
 * Unit tests for `TaskManagerAppLogic` are in `handler_tests.rs`.
 */
pub mod handler;
pub mod navigation_state;
pub mod reports_view;
pub mod router;


pub use handler::TaskManagerAppLogic;
