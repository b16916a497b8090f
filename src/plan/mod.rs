mod finish;
mod gap;
mod score;
mod submit;
mod upload;

pub use finish::{finish_plan, plan_is_complete};
pub use gap::calculate_gap;
pub use score::{read_plan, score_district, score_plan};
pub use submit::submit_plan;
pub use upload::{DistrictResult, DistrictSummary, Model, Progress, Upload};
