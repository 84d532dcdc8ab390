//! PIA animation files
//!
//! Every channel carries the same number of keys. The `_TIME` stream holds
//! the duration leading up to each key (zero for the first), so a
//! channel's times sum to `TotalTime`. Bone matrices are stored
//! transposed like skeleton rest poses.

use std::path::Path;

use glam::Mat4;

use super::pix::{
    FileKind, Header, PixFile, Section, Value, WriteOptions, global_section, indexed_row, read_float_rows,
    validate_globals,
};
use crate::error::{Diagnostic, Error, Result};

pub const FORMAT_VERSION: i64 = 3;

const TIME: &str = "_TIME";
const MATRIX: &str = "_MATRIX";
const POSITION: &str = "_POSITION";

/// Allowed drift between summed key times and `TotalTime`, in seconds.
const TIME_TOLERANCE: f32 = 1e-3;

/// Keyed bone transforms, game basis, relative to the parent's rest pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneChannel {
    pub bone: String,
    pub times: Vec<f32>,
    pub matrices: Vec<Mat4>,
}

/// Keyed positions of a non-bone channel such as `Prism Movement`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomChannel {
    pub name: String,
    pub times: Vec<f32>,
    /// Incremental per key, game basis.
    pub positions: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiaAnimation {
    pub name: String,
    /// Skeleton file name the channels index into.
    pub skeleton: String,
    /// Seconds.
    pub total_time: f32,
    pub keyframe_count: usize,
    pub bone_channels: Vec<BoneChannel>,
    pub custom_channels: Vec<CustomChannel>,
}

/// Uniform key durations for `count` keys spaced `step` seconds apart.
#[must_use]
pub fn uniform_times(count: usize, step: f32) -> Vec<f32> {
    (0..count).map(|i| if i == 0 { 0.0 } else { step }).collect()
}

fn ms(seconds: f32) -> usize {
    (seconds * 1000.0).round().max(0.0) as usize
}

fn check_channel(name: &str, times: &[f32], samples: usize, animation: &PiaAnimation) -> Result<()> {
    for found in [times.len(), samples] {
        if found != animation.keyframe_count {
            return Err(Error::ChannelLengthMismatch {
                channel: name.to_string(),
                expected: animation.keyframe_count,
                found,
                unit: "samples",
            });
        }
    }
    let sum: f32 = times.iter().sum();
    if (sum - animation.total_time).abs() > TIME_TOLERANCE {
        return Err(Error::ChannelLengthMismatch {
            channel: name.to_string(),
            expected: ms(animation.total_time),
            found: ms(sum),
            unit: "ms",
        });
    }
    Ok(())
}

impl PiaAnimation {
    /// Every channel must carry `keyframe_count` keys whose times sum to
    /// `total_time`.
    ///
    /// # Errors
    /// [`Error::ChannelLengthMismatch`] naming the first bad channel.
    pub fn validate(&self) -> Result<()> {
        for channel in &self.bone_channels {
            check_channel(&channel.bone, &channel.times, channel.matrices.len(), self)?;
        }
        for channel in &self.custom_channels {
            check_channel(&channel.name, &channel.times, channel.positions.len(), self)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn bone_channel(&self, bone: &str) -> Option<&BoneChannel> {
        self.bone_channels.iter().find(|c| c.bone == bone)
    }
}

fn stream(tag: &str, format: &str, rows: impl IntoIterator<Item = Vec<f32>>) -> Section {
    let mut section = Section::new("Stream")
        .with("Format", Value::token(format))
        .with("Tag", Value::string(tag));
    for (index, row) in rows.into_iter().enumerate() {
        section.push_row(indexed_row(index, Value::hex(&row)));
    }
    section
}

fn read_stream(channel: &Section, tag: &str, width: usize) -> Result<Vec<Vec<f32>>> {
    let section = channel
        .children_named("Stream")
        .find(|s| s.opt_str("Tag") == Some(tag))
        .ok_or_else(|| Error::inconsistent(&channel.type_name, format!("missing {tag} stream")))?;
    read_float_rows(section, width)
}

fn read_times(channel: &Section) -> Result<Vec<f32>> {
    Ok(read_stream(channel, TIME, 1)?.into_iter().map(|row| row[0]).collect())
}

/// Read an animation file.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`], [`Error::Inconsistent`],
/// [`Error::ChannelLengthMismatch`].
pub fn read_pia<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PiaAnimation, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading animation {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pia(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed animation file.
///
/// # Errors
/// See [`read_pia`].
pub fn parse_pia(file: &mut PixFile, recount: bool) -> Result<(PiaAnimation, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Animation, &[FORMAT_VERSION])?;
    let diagnostics = validate_globals(file, FileKind::Animation, recount)?;
    let global = file.req_section("Global")?;

    let mut animation = PiaAnimation {
        name: header.name,
        skeleton: global.opt_str("Skeleton").unwrap_or_default().to_string(),
        total_time: global.req_float("TotalTime")?,
        keyframe_count: global.req_usize("KeyframeCount")?,
        ..PiaAnimation::default()
    };

    for section in file.sections_named("BoneChannel") {
        let bone = section.req_str("Name")?.to_string();
        let matrices = read_stream(section, MATRIX, 16)?
            .into_iter()
            .map(|row| Mat4::from_cols_slice(&row))
            .collect();
        animation.bone_channels.push(BoneChannel {
            bone,
            times: read_times(section)?,
            matrices,
        });
    }
    for section in file.sections_named("CustomChannel") {
        let name = section.req_str("Name")?.to_string();
        let positions = read_stream(section, POSITION, 3)?
            .into_iter()
            .map(|row| [row[0], row[1], row[2]])
            .collect();
        animation.custom_channels.push(CustomChannel {
            name,
            times: read_times(section)?,
            positions,
        });
    }

    animation.validate()?;
    tracing::debug!(
        "Animation '{}': {} key(s), {} bone and {} custom channel(s)",
        animation.name,
        animation.keyframe_count,
        animation.bone_channels.len(),
        animation.custom_channels.len()
    );
    Ok((animation, diagnostics))
}

/// Encode an animation.
///
/// # Errors
/// [`Error::ChannelLengthMismatch`] when a channel disagrees with the
/// animation's key count or total time.
pub fn to_pix(animation: &PiaAnimation) -> Result<PixFile> {
    animation.validate()?;
    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Animation, FORMAT_VERSION, &animation.name).to_section());

    let mut body = PixFile::new();
    for channel in &animation.bone_channels {
        let mut section = Section::new("BoneChannel")
            .with("Name", Value::string(&channel.bone))
            .with("StreamCount", Value::Int(2))
            .with("KeyframeCount", Value::Int(channel.times.len() as i64));
        section.push_section(stream(TIME, "FLOAT", channel.times.iter().map(|t| vec![*t])));
        section.push_section(stream(
            MATRIX,
            "FLOAT4x4",
            channel.matrices.iter().map(|m| m.to_cols_array().to_vec()),
        ));
        body.push(section);
    }
    for channel in &animation.custom_channels {
        let mut section = Section::new("CustomChannel")
            .with("Name", Value::string(&channel.name))
            .with("StreamCount", Value::Int(2))
            .with("KeyframeCount", Value::Int(channel.times.len() as i64));
        section.push_section(stream(TIME, "FLOAT", channel.times.iter().map(|t| vec![*t])));
        section.push_section(stream(POSITION, "FLOAT3", channel.positions.iter().map(|p| p.to_vec())));
        body.push(section);
    }

    file.push(global_section(
        &body,
        FileKind::Animation,
        vec![
            ("Skeleton", Value::string(&animation.skeleton)),
            ("TotalTime", Value::Float(animation.total_time)),
            ("KeyframeCount", Value::Int(animation.keyframe_count as i64)),
        ],
    ));
    file.items.extend(body.items);
    Ok(file)
}

/// Write an animation file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pia<P: AsRef<Path>>(animation: &PiaAnimation, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing animation {}", path.display());
    to_pix(animation)?.write(path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample() -> PiaAnimation {
        let times = uniform_times(3, 0.5);
        PiaAnimation {
            name: "open".into(),
            skeleton: "arm.pis".into(),
            total_time: 1.0,
            keyframe_count: 3,
            bone_channels: vec![BoneChannel {
                bone: "hinge".into(),
                times: times.clone(),
                matrices: (0..3)
                    .map(|i| Mat4::from_translation(Vec3::new(0.0, i as f32 * 0.25, 0.0)))
                    .collect(),
            }],
            custom_channels: vec![CustomChannel {
                name: "Prism Movement".into(),
                times,
                positions: vec![[0.0; 3], [0.0, 0.0, -1.0], [0.0, 0.0, -1.0]],
            }],
        }
    }

    #[test]
    fn test_roundtrip() {
        let animation = sample();
        let text = to_pix(&animation).unwrap().to_pix_string(&WriteOptions::default());
        let mut reparsed = PixFile::parse(&text).unwrap();
        let (back, diagnostics) = parse_pia(&mut reparsed, false).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(back, animation);
    }

    #[test]
    fn test_sample_count_mismatch() {
        let mut animation = sample();
        animation.bone_channels[0].matrices.pop();
        assert!(matches!(
            to_pix(&animation),
            Err(Error::ChannelLengthMismatch { expected: 3, found: 2, unit: "samples", .. })
        ));
    }

    #[test]
    fn test_total_time_mismatch() {
        let mut animation = sample();
        animation.custom_channels[0].times[2] = 0.75;
        match to_pix(&animation) {
            Err(Error::ChannelLengthMismatch { channel, expected, found, unit }) => {
                assert_eq!(channel, "Prism Movement");
                assert_eq!((expected, found, unit), (1000, 1250, "ms"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
