pub mod cli;
pub mod config;
pub mod constants;
pub mod renderer;

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use log::info;

use crate::cli::{Cli, Command, FontArgs};
use crate::config::{Config, FontSettings};
use crate::renderer::font::{open_font, FaceRegistry, FontOptions, TrueTypeFont};
use crate::renderer::{Color, Rect, SharedHost, Size, SoftwareHost};

pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load(),
    };
    let registry = FaceRegistry::truetype();

    match cli.command {
        Command::Measure { font, text } => {
            let (settings, path) = resolve_font(&config, &font)?;
            let host: SharedHost = Rc::new(RefCell::new(SoftwareHost::new(Size::square(1))));
            let mut font = open_font(
                settings.backend,
                &registry,
                host,
                &path,
                &FontOptions::from(&settings),
            )?;
            let codepoints: Vec<u32> = text.chars().map(u32::from).collect();
            let size = font.get_dimension(&codepoints);
            println!("{} {}", size.width, size.height);
        }
        Command::Render {
            font,
            width,
            height,
            center,
            output,
            text,
        } => {
            let (settings, path) = resolve_font(&config, &font)?;
            let canvas = Rc::new(RefCell::new(SoftwareHost::new(Size::new(width, height))));
            let host: SharedHost = canvas.clone();
            let mut font = open_font(
                settings.backend,
                &registry,
                host,
                &path,
                &FontOptions::from(&settings),
            )?;
            let codepoints: Vec<u32> = text.chars().map(u32::from).collect();
            let rect = Rect::new(0, 0, width as i32, height as i32);
            let stats = font.draw(&codepoints, rect, Color::WHITE, center, center, None);
            info!(
                "Drew {} glyphs in {} draw calls ({} page uploads)",
                stats.glyphs, stats.draw_calls, stats.pages_flushed
            );
            canvas.borrow().canvas().save(&output)?;
            info!("Wrote {}", output.display());
        }
        Command::Atlas {
            font,
            out_dir,
            text,
        } => {
            let (settings, path) = resolve_font(&config, &font)?;
            let host: SharedHost = Rc::new(RefCell::new(SoftwareHost::new(Size::square(1))));
            let mut font =
                TrueTypeFont::new(&registry, host, &path, &FontOptions::from(&settings))?;
            font.draw(
                text.as_str(),
                Rect::new(0, 0, 1, 1),
                Color::WHITE,
                false,
                false,
                None,
            );
            fs::create_dir_all(&out_dir)?;
            for index in 0..font.page_count() {
                if let Some(image) = font.page_image(index) {
                    let file = out_dir.join(format!("page{}.png", index));
                    image.save(&file)?;
                    println!("{}", file.display());
                }
            }
        }
    }
    Ok(())
}

fn resolve_font(
    config: &Config,
    args: &FontArgs,
) -> Result<(FontSettings, PathBuf), Box<dyn std::error::Error>> {
    let mut settings = config.font.clone();
    args.apply(&mut settings);
    let path = settings
        .path
        .clone()
        .ok_or("no font given: pass --font or set font.path in the config")?;
    Ok((settings, path))
}
