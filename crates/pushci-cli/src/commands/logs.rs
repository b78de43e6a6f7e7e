//! Log commands.

use anyhow::{Context, Result, bail};
use pushci_core::Job;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize)]
struct LogsResponse {
    logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

pub async fn list(api_url: &str) -> Result<()> {
    let url = format!("{}/logs", api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    if !response.status().is_success() {
        bail!("Server returned {}", response.status());
    }

    let body: LogsResponse = response.json().await.context("Unexpected response")?;
    if body.logs.is_empty() {
        println!("No jobs yet");
    }
    for id in body.logs {
        println!("{}", id);
    }
    Ok(())
}

pub async fn show(api_url: &str, id: &str) -> Result<()> {
    let url = format!("{}/logs/{}", api_url.trim_end_matches('/'), id);
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.message)
            .unwrap_or_default();
        bail!("Server returned {}: {}", status, message);
    }

    let job: Job = response.json().await.context("Unexpected response")?;
    print!("{}", render_job(&job));
    Ok(())
}

/// Human readable job summary followed by every log segment.
pub fn render_job(job: &Job) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job:      {}", job.id);
    let _ = writeln!(out, "Status:   {}", job.status);
    let _ = writeln!(out, "Repo:     {}", job.repo_url);
    let _ = writeln!(out, "Ref:      {}", job.r#ref);
    let _ = writeln!(out, "Commit:   {}", job.head_commit);
    let _ = writeln!(out, "Author:   {}", job.author);
    let _ = writeln!(out, "Started:  {}", job.time_started.to_rfc3339());
    if let Some(ended) = job.time_ended {
        let elapsed = ended - job.time_started;
        let _ = writeln!(
            out,
            "Ended:    {} ({:.1}s)",
            ended.to_rfc3339(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }

    for (i, segment) in job.logs.iter().enumerate() {
        let _ = writeln!(out, "\n--- step {} ---", i + 1);
        out.push_str(segment);
        if !segment.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushci_core::{JobId, JobStatus};

    #[test]
    fn test_render_job() {
        let started = chrono::Utc::now();
        let job = Job {
            id: JobId::new(),
            status: JobStatus::Failure,
            repo_url: "https://github.com/octo/widgets.git".to_string(),
            r#ref: "refs/heads/main".to_string(),
            head_commit: "abc1234".to_string(),
            author: "octocat".to_string(),
            time_started: started,
            time_ended: Some(started + chrono::Duration::milliseconds(2500)),
            logs: vec![
                "$ git clone\nexit status: 0\n".to_string(),
                "$ flake8\nexit status: 1".to_string(),
            ],
        };

        let text = render_job(&job);

        assert!(text.contains(&format!("Job:      {}", job.id)));
        assert!(text.contains("Status:   failure"));
        assert!(text.contains("(2.5s)"));
        assert!(text.contains("--- step 1 ---\n$ git clone"));
        assert!(text.contains("--- step 2 ---\n$ flake8\nexit status: 1\n"));
    }
}
