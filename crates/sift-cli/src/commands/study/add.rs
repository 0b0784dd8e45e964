use sift_core::entities::NewWork;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Bibliographic fields given on the command line.
pub struct WorkArgs<'a> {
    pub title: &'a str,
    pub abstract_text: Option<&'a str>,
    pub journal: Option<&'a str>,
    pub year: Option<i32>,
    pub keywords: &'a [String],
}

pub async fn run(
    project_id: &str,
    work: WorkArgs<'_>,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let work = NewWork {
        title: work.title.to_string(),
        abstract_text: work.abstract_text.map(str::to_string),
        journal: work.journal.map(str::to_string),
        publication_year: work.year,
        keywords: work.keywords.to_vec(),
    };
    let study = ctx.service.add_study(project_id, &work).await?;
    output(&study, flags.format)
}
