mod dispatch;
mod driver;
mod invocation;
mod tiles;

pub use dispatch::{Dispatcher, QueueDispatcher};
pub use driver::{drain_queue, load_geometry, post_score_results, run_district, Env, Outcome};
pub use invocation::{Invocation, SystemInvocation};
pub use tiles::{run_tile, TileResult, TileTotals};
