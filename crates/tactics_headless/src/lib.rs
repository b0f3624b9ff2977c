//! Headless scenario runner for the tactical kernel.
//!
//! Loads a battlefield from a RON scenario and drives kernel operations
//! from the command line, writing results as JSON lines. This enables:
//!
//! - **AI inspection**: Watch what each AI unit decides, round by round
//! - **Map debugging**: Query routes, reachable areas and fields of view
//! - **Determinism checks**: Sweep seeds in parallel and replay them
//!
//! # Output
//!
//! - **stdout**: One JSON record per line (see [`protocol`])
//! - **stderr**: Logs and ASCII maps (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Three AI rounds of the built-in breach scenario
//! cargo run -p tactics_headless -- think --scenario breach --rounds 3
//!
//! # Route for a named unit
//! cargo run -p tactics_headless -- path --scenario breach --unit rookie --to 9,9,0
//!
//! # Seed sweep
//! cargo run -p tactics_headless -- batch --scenario maps/breach.ron --runs 64
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ascii_visualizer::{render_level, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use protocol::{Effect, Record};
pub use runner::Session;
pub use scenario::{PartSpec, Placement, Scenario, ScenarioError, UnitSetup, WaypointSetup};
