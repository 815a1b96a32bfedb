// RIFF/WAVE container header parsing

use chime_audio_api::{Container, ContainerParser, Encoding, OutputFormat, ParsedHeader};
use chime_core::{AudioError, Result};

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_MIN_LEN: usize = 16;
const FMT_EXTENSIBLE_LEN: usize = 40;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// `ContainerParser` for canonical and extensible PCM wave files
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveParser;

impl WaveParser {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerParser for WaveParser {
    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader> {
        parse_wave(data)
    }
}

fn invalid(msg: impl Into<String>) -> AudioError {
    AudioError::InvalidHeader(msg.into())
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn parse_fmt(body: &[u8]) -> Result<OutputFormat> {
    if body.len() < FMT_MIN_LEN {
        return Err(invalid(format!("fmt chunk too short ({} bytes)", body.len())));
    }

    let mut tag = read_u16(body, 0);
    let channels = read_u16(body, 2);
    let sample_rate = read_u32(body, 4);
    let bits_per_sample = read_u16(body, 14);

    if tag == FORMAT_EXTENSIBLE {
        if body.len() < FMT_EXTENSIBLE_LEN {
            return Err(invalid("extensible fmt chunk too short"));
        }
        // First two bytes of the sub-format GUID carry the real format tag
        tag = read_u16(body, 24);
    }

    if tag != FORMAT_PCM {
        return Err(AudioError::UnsupportedFormat(format!(
            "wave format tag {:#06x}",
            tag
        )));
    }
    if channels == 0 {
        return Err(invalid("zero channels"));
    }
    if sample_rate == 0 {
        return Err(invalid("zero sample rate"));
    }
    if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
        return Err(AudioError::UnsupportedFormat(format!(
            "{} bits per sample",
            bits_per_sample
        )));
    }

    Ok(OutputFormat {
        container: Container::Wave,
        encoding: Encoding::Pcm,
        sample_rate,
        channels,
        bits_per_sample,
    })
}

/// Parse a fully buffered wave file.
///
/// The returned data region always lies within `data` and holds a whole
/// number of frames; a file whose data chunk is shorter than declared is
/// clamped to the bytes present.
pub fn parse_wave(data: &[u8]) -> Result<ParsedHeader> {
    if data.len() < RIFF_HEADER_LEN {
        return Err(invalid(format!("{} bytes is too short", data.len())));
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(invalid("missing RIFF/WAVE signature"));
    }

    let mut format: Option<OutputFormat> = None;
    let mut pos = RIFF_HEADER_LEN;

    while pos + CHUNK_HEADER_LEN <= data.len() {
        let id = &data[pos..pos + 4];
        let size = read_u32(data, pos + 4) as usize;
        let body = pos + CHUNK_HEADER_LEN;
        let available = data.len() - body;

        match id {
            b"fmt " => {
                if size > available {
                    return Err(invalid("truncated fmt chunk"));
                }
                format = Some(parse_fmt(&data[body..body + size])?);
            }
            b"data" => {
                let format = format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                let frame = format.frame_size();
                let mut data_len = size.min(available);
                if data_len < size {
                    log::warn!(
                        "Wave data chunk declares {} bytes, only {} present",
                        size,
                        data_len
                    );
                }
                data_len -= data_len % frame;
                if data_len == 0 {
                    return Err(invalid("no audio data"));
                }
                log::debug!(
                    "Wave header: {}Hz, {} ch, {} bit, data {}+{}",
                    format.sample_rate,
                    format.channels,
                    format.bits_per_sample,
                    body,
                    data_len
                );
                return Ok(ParsedHeader {
                    data_offset: body,
                    data_len,
                    format,
                });
            }
            _ => {
                log::trace!("Skipping wave chunk {:?}", String::from_utf8_lossy(id));
            }
        }

        // Chunks are word aligned
        pos = match body
            .checked_add(size)
            .and_then(|end| end.checked_add(size & 1))
        {
            Some(next) => next,
            None => return Err(invalid("chunk size overflow")),
        };
    }

    Err(invalid("no data chunk"))
}
