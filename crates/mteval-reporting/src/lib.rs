pub mod export;
pub mod html;

pub use export::{
    ReportPaths, export_all_models, export_category_transcript, export_csv, report_stem,
    write_reports,
};
pub use html::{HtmlBuilder, export_html};
