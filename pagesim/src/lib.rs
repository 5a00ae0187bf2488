// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    OptionOverrides, expand_path, load_graph, parse_format, parse_metrics, run_estimate,
    run_simulation,
};
