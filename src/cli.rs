use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::FontSettings;
use crate::constants::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "ttglyph")]
#[command(version)]
#[command(about = "Measure and render text through a paged glyph atlas", long_about = None)]
#[command(after_help = "\
CONFIG:
    Options not given on the command line are read from
    $XDG_CONFIG_HOME/ttglyph/config.toml (or the platform config dir).")]
pub struct Cli {
    /// Read settings from this file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct FontArgs {
    /// TrueType/OpenType font file
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Pixel size
    #[arg(long)]
    pub size: Option<u32>,

    /// Render without antialiasing
    #[arg(long)]
    pub mono: bool,

    /// Disable hinting and auto-hinting
    #[arg(long)]
    pub no_hinting: bool,

    /// Code points rasterized per cache miss
    #[arg(long)]
    pub batch: Option<u32>,
}

impl FontArgs {
    /// Override `settings` with whatever was given on the command line.
    pub fn apply(&self, settings: &mut FontSettings) {
        if let Some(font) = &self.font {
            settings.path = Some(font.clone());
        }
        if let Some(size) = self.size {
            settings.size = size;
        }
        if self.mono {
            settings.antialias = false;
        }
        if self.no_hinting {
            settings.hinting = false;
            settings.auto_hinting = false;
        }
        if let Some(batch) = self.batch {
            settings.batch_load_size = batch;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the width and height of TEXT
    Measure {
        #[command(flatten)]
        font: FontArgs,
        text: String,
    },
    /// Draw TEXT onto a transparent canvas and save it as PNG
    Render {
        #[command(flatten)]
        font: FontArgs,
        #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
        width: u32,
        #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
        height: u32,
        /// Center horizontally and vertically
        #[arg(long)]
        center: bool,
        #[arg(short, long)]
        output: PathBuf,
        text: String,
    },
    /// Draw TEXT, then dump every glyph page as PNG
    Atlas {
        #[command(flatten)]
        font: FontArgs,
        #[arg(long)]
        out_dir: PathBuf,
        text: String,
    },
}
