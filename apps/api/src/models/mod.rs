pub mod evaluation;
pub mod job_template;
