//! CLI command for converting TOBJ encodings

use std::path::Path;

use super::TobjFormat;
use crate::config::TobjEncoding;
use crate::formats::{read_tobj, write_tobj};

pub fn execute(source: &Path, output: Option<&Path>, to: TobjFormat) -> anyhow::Result<()> {
    let tobj = read_tobj(source)?;
    let encoding = match to {
        TobjFormat::Text => TobjEncoding::Text,
        TobjFormat::Binary => TobjEncoding::Binary,
    };
    let target = output.unwrap_or(source);
    write_tobj(&tobj, target, encoding)?;
    println!("{} -> {} ({encoding:?})", source.display(), target.display());
    Ok(())
}
