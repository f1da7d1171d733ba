//! Dispatch one request through the configured dispatcher.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use portico::prelude::*;
use serde::Serialize;

use super::DispatchArgs;
use crate::context::Context;
use crate::output::status_badge;

/// Response as printed with `--json`.
#[derive(Serialize)]
struct ResponseReport {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

/// Run the dispatch command.
pub fn run(args: DispatchArgs, ctx: &Context) -> Result<()> {
    let config = ctx.dispatch_config();

    // The CLI has no application routes; router requests answer 404.
    let router: Arc<dyn PathRouter> = Arc::new(RouteTable::new());
    let dispatcher = SchemeDispatcher::from_config(&config, Some(router))
        .context("Failed to configure dispatcher")?;
    ctx.output.debug(&format!(
        "Dispatching with the {} policy",
        dispatcher.policy().name()
    ));

    let request = build_request(&args, ctx)?;
    let response = dispatcher.handle_raw(request);
    print_response(&response, args.include, ctx)
}

fn build_request(args: &DispatchArgs, ctx: &Context) -> Result<RawSchemeRequest> {
    let method = match (&args.method, &args.data) {
        (Some(method), _) => method.to_ascii_uppercase(),
        (None, Some(_)) => "POST".to_string(),
        (None, None) => "GET".to_string(),
    };

    let mut request = RawSchemeRequest::new(method, args.url.clone());
    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        request = request.with_header(name, value);
    }

    if let Some(data) = &args.data {
        let body = match data.strip_prefix('@') {
            Some(path) => {
                let path = ctx.resolve_path(path);
                std::fs::read(&path)
                    .with_context(|| format!("Failed to read body file: {}", path.display()))?
            }
            None => data.clone().into_bytes(),
        };
        request = request.with_body(body);
    }

    Ok(request)
}

/// Split a `Name: value` header argument.
fn parse_header(header: &str) -> Result<(String, String)> {
    let Some((name, value)) = header.split_once(':') else {
        bail!("Invalid header '{}': expected 'Name: value'", header);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header '{}': empty name", header);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn header_pairs(response: &SchemeResponse) -> Vec<(String, String)> {
    response
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn print_response(response: &SchemeResponse, include: bool, ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ResponseReport {
            status: response.status,
            headers: header_pairs(response),
            body: response.text(),
        });
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    if include {
        let reason = response
            .clone()
            .into_http()
            .status()
            .canonical_reason()
            .unwrap_or_default();
        writeln!(stdout, "{} {}", status_badge(response.status), reason)?;
        for (name, value) in header_pairs(response) {
            writeln!(stdout, "{}: {}", name, value)?;
        }
        writeln!(stdout)?;
    }
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}
