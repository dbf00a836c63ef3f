pub mod artifacts;
pub mod compartments;
pub mod config;
pub mod distributions;
pub mod driver;
pub mod error;
pub mod initial_conditions;
pub mod integrate;
pub mod modifiers;
pub mod parameters;
pub mod prelude;
pub mod seeding;
pub mod subpop;
pub mod time_setup;
