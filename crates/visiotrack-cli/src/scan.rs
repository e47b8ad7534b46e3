//! `visiotrack scan`: acquire a photo, analyze it, review, save.

use crate::config::Config;
use crate::view;
use crate::ProfileArgs;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use visiotrack_ai::GeminiClient;
use visiotrack_core::{CapturedImage, Desk, ProfileField, ScanSession, ScanState, Slot};
use visiotrack_hw::Camera;

#[derive(Args)]
pub struct ScanArgs {
    /// Photo to upload (JPEG, PNG or WebP)
    #[arg(short, long, conflicts_with = "camera")]
    image: Option<PathBuf>,
    /// Take the photo with the camera instead
    #[arg(short, long)]
    camera: bool,
    /// Capture device (overrides VISIOTRACK_CAMERA_DEVICE)
    #[arg(long, requires = "camera")]
    device: Option<String>,
    /// Save without the interactive review prompt
    #[arg(short, long)]
    yes: bool,
    #[command(flatten)]
    fields: ProfileArgs,
}

enum Choice {
    Save,
    Edit,
    Cancel,
}

pub async fn run<S: Slot>(config: &Config, desk: &mut Desk<S>, args: ScanArgs) -> Result<()> {
    let analyzer = GeminiClient::new(config.gemini.clone())?;
    let image = acquire(config, &args).await?;

    let mut session = ScanSession::new();
    println!("Analyzing photo...");
    if let ScanState::AnalysisFailed { message, .. } = session.analyze(&analyzer, image).await {
        bail!("{message}");
    }

    let overrides = args.fields.overrides();
    if !overrides.is_empty() {
        session.start_editing()?;
        for (field, value) in overrides {
            session.edit_field(field, value)?;
        }
        session.stop_editing()?;
    }

    if !args.yes {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        loop {
            if let Some(candidate) = session.state().candidate() {
                view::print_profile(candidate);
            }
            match prompt_choice(&mut input)? {
                Choice::Save => break,
                Choice::Edit => {
                    session.start_editing()?;
                    for field in ProfileField::ALL {
                        let current = match session.state().candidate() {
                            Some(p) => p.field(field).to_string(),
                            None => break,
                        };
                        let answer = prompt(&mut input, &format!("{} [{current}]: ", label(field)))?;
                        if !answer.is_empty() {
                            session.edit_field(field, &answer)?;
                        }
                    }
                    session.stop_editing()?;
                }
                Choice::Cancel => {
                    session.reset();
                    println!("Scan discarded");
                    return Ok(());
                }
            }
        }
    }

    let id = session.save(desk, Utc::now())?;
    println!("Checked in {id}");
    Ok(())
}

async fn acquire(config: &Config, args: &ScanArgs) -> Result<CapturedImage> {
    if let Some(path) = &args.image {
        return visiotrack_hw::load_upload(path)
            .with_context(|| format!("loading {}", path.display()));
    }
    if !args.camera {
        bail!("pass --image <file> or --camera");
    }

    let device = args
        .device
        .clone()
        .unwrap_or_else(|| config.camera_device.clone());
    let warmup = config.warmup_frames;
    println!("Capturing from {device}...");
    let image = tokio::task::spawn_blocking(move || {
        let camera = Camera::open(&device)?;
        camera.capture_image(warmup)
    })
    .await
    .context("capture task panicked")??;
    Ok(image)
}

fn label(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Name => "Name",
        ProfileField::Age => "Age",
        ProfileField::Gender => "Gender",
        ProfileField::Profession => "Profession",
    }
}

fn prompt(input: &mut impl BufRead, question: &str) -> Result<String> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

fn prompt_choice(input: &mut impl BufRead) -> Result<Choice> {
    loop {
        let answer = prompt(input, "[s]ave, [e]dit, [c]ancel? ")?;
        match answer.to_ascii_lowercase().as_str() {
            "s" | "save" | "" => return Ok(Choice::Save),
            "e" | "edit" => return Ok(Choice::Edit),
            "c" | "cancel" => return Ok(Choice::Cancel),
            _ => println!("Please answer s, e or c"),
        }
    }
}
