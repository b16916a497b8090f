#![doc = "PlanScore district scoring engine"]
mod geom;

pub mod compactness;
pub mod config;
pub mod error;
pub mod io;
pub mod partial;
pub mod plan;
pub mod precinct;
pub mod store;
pub mod tile;
pub mod worker;

#[doc(inline)]
pub use config::ScoreConfig;

#[doc(inline)]
pub use error::{score_error, ScoreError};

#[doc(inline)]
pub use partial::{Continuation, Partial, Step};

#[doc(inline)]
pub use plan::{calculate_gap, finish_plan, score_district, score_plan, submit_plan, Upload};

#[doc(inline)]
pub use precinct::{score_district_over_tile, score_precinct, Totals};

#[doc(inline)]
pub use tile::TileId;

#[doc(inline)]
pub use worker::{drain_queue, run_district, run_tile, Env, Outcome};
