use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use scribe_core::{Attachments, TopicImage};

use super::config::ClientConfig;

#[derive(Debug, Parser)]
#[command(
    name = "scribe",
    version,
    about = "Submit article topics to the generation backend and follow the batch"
)]
pub struct Cli {
    /// Topics to generate, one article each.
    pub topics: Vec<String>,

    /// Read additional topics from a file, one per line.
    #[arg(long, value_name = "PATH")]
    pub topics_file: Option<PathBuf>,

    /// Attach a remote image to a topic.
    #[arg(long = "image", value_name = "TOPIC=URL", value_parser = parse_assignment)]
    pub images: Vec<(String, String)>,

    /// Attach a previously uploaded image to a topic.
    #[arg(long = "upload", value_name = "TOPIC=PATH", value_parser = parse_assignment)]
    pub uploads: Vec<(String, String)>,

    /// Resubmit the draft saved by the last submission.
    #[arg(long)]
    pub draft: bool,

    /// Forget the saved job before doing anything else.
    #[arg(long)]
    pub abandon: bool,

    #[arg(long, default_value = "scribe.ron")]
    pub config: PathBuf,

    /// Overrides `api_base` from the config file.
    #[arg(long)]
    pub api_base: Option<String>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl Cli {
    pub(crate) fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
    }

    /// Positional topics followed by the lines of `--topics-file`. Blank lines
    /// and duplicates are left to submission validation.
    pub(crate) fn read_topics(&self) -> anyhow::Result<Vec<String>> {
        let mut topics = self.topics.clone();
        if let Some(path) = &self.topics_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading topics from {}", path.display()))?;
            topics.extend(text.lines().map(str::to_string));
        }
        Ok(topics)
    }

    /// Uploaded images win over URLs given for the same topic.
    pub(crate) fn attachments(&self) -> Attachments {
        let mut attachments = Attachments::new();
        for (topic, url) in &self.images {
            attachments.insert(topic.clone(), TopicImage::Url(url.clone()));
        }
        for (topic, path) in &self.uploads {
            attachments.insert(topic.clone(), TopicImage::Uploaded(path.clone()));
        }
        attachments
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (topic, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TOPIC=VALUE, got {raw:?}"))?;
    let (topic, value) = (topic.trim(), value.trim());
    if topic.is_empty() || value.is_empty() {
        return Err(format!("expected TOPIC=VALUE, got {raw:?}"));
    }
    Ok((topic.to_string(), value.to_string()))
}
