pub mod model;
pub mod report;
pub mod service;

pub use model::{
    ArtifactRef, CaptureOutcome, CaptureRequest, CaptureResponse, StopRequest,
    generate_session_id,
};
pub use report::{ReportFormat, generate_capture_report};
pub use service::CaptureService;

pub const BANNER: &str = r#"
                 __    ____      ___
 _      _____  / /_  / __/___  / (_)___
| | /| / / _ \/ __ \/ /_/ __ \/ / / __ \
| |/ |/ /  __/ /_/ / __/ /_/ / / / /_/ /
|__/|__/\___/_.___/_/  \____/_/_/\____/
"#;

pub fn print_banner() {
    println!("{}", BANNER);
    println!("  webfolio v{}\n", env!("CARGO_PKG_VERSION"));
}
