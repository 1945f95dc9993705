use super::Alignment;
use crate::error::{SelError, SelResult};
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn read_alignment_file(path: impl AsRef<Path>) -> SelResult<Alignment> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_alignment(&text, &path.display().to_string())
}

/// Reads FASTA (first non-blank character `>`) or relaxed sequential PHYLIP.
pub fn parse_alignment(text: &str, source_name: &str) -> SelResult<Alignment> {
    let first = text.trim_start().chars().next();
    let records = match first {
        Some('>') => parse_fasta(text, source_name)?,
        Some(_) => parse_phylip(text, source_name)?,
        None => return Err(parse_error(source_name, 1, "alignment is empty")),
    };
    debug!("Read {} sequences from {}", records.len(), source_name);
    Alignment::new(records)
}

fn parse_error(source_name: &str, line: usize, message: impl Into<String>) -> SelError {
    SelError::Parse {
        source_name: source_name.to_string(),
        line,
        message: message.into(),
    }
}

fn sequence_chars(line: &str) -> impl Iterator<Item = u8> + '_ {
    line.bytes().filter(|b| !b.is_ascii_whitespace())
}

fn parse_fasta(text: &str, source_name: &str) -> SelResult<Vec<(String, Vec<u8>)>> {
    let mut records: Vec<(String, Vec<u8>)> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            let name = header.split_whitespace().next().unwrap_or("");
            if name.is_empty() {
                return Err(parse_error(source_name, idx + 1, "FASTA header without a name"));
            }
            records.push((name.to_string(), Vec::new()));
        } else if !line.trim().is_empty() {
            match records.last_mut() {
                Some((_, seq)) => seq.extend(sequence_chars(line)),
                None => return Err(parse_error(source_name, idx + 1, "sequence data before first header")),
            }
        }
    }
    Ok(records)
}

fn parse_phylip(text: &str, source_name: &str) -> SelResult<Vec<(String, Vec<u8>)>> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_idx, header) = lines
        .next()
        .ok_or_else(|| parse_error(source_name, 1, "missing PHYLIP header"))?;
    let dims: Vec<usize> = header
        .split_whitespace()
        .take(2)
        .map(|t| t.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| parse_error(source_name, header_idx + 1, "PHYLIP header must be '<taxa> <length>'"))?;
    if dims.len() != 2 {
        return Err(parse_error(source_name, header_idx + 1, "PHYLIP header must be '<taxa> <length>'"));
    }
    let (taxa, width) = (dims[0], dims[1]);

    let mut records: Vec<(String, Vec<u8>)> = Vec::with_capacity(taxa);
    for (idx, line) in lines {
        let needs_more = records.last().is_some_and(|(_, s)| s.len() < width);
        if needs_more {
            if let Some((_, seq)) = records.last_mut() {
                seq.extend(sequence_chars(line));
            }
            continue;
        }
        if records.len() == taxa {
            return Err(parse_error(source_name, idx + 1, format!("more than {} sequences", taxa)));
        }
        let trimmed = line.trim_start();
        let (name, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
        records.push((name.to_string(), sequence_chars(rest).collect()));
    }

    if records.len() != taxa {
        return Err(parse_error(
            source_name,
            text.lines().count(),
            format!("expected {} sequences, found {}", taxa, records.len()),
        ));
    }
    if let Some((name, seq)) = records.iter().find(|(_, s)| s.len() != width) {
        return Err(parse_error(
            source_name,
            text.lines().count(),
            format!("sequence '{}' has {} characters, header says {}", name, seq.len(), width),
        ));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fasta_multiline() {
        let text = ">one description\nATGGCC\nTTT\n\n>two\nATG\nGCCTTA\n";
        let aln = parse_alignment(text, "x.fa").unwrap();
        assert_eq!(aln.taxa(), &["one".to_string(), "two".to_string()]);
        assert_eq!(aln.site_count(), 3);
    }

    #[test]
    fn test_relaxed_phylip_with_wrapped_sequences() {
        let text = "3 9\nlong_taxon_name ATG GCC\nTTT\nb ATGGCCTTT\nc ATGGCC---\n";
        let aln = parse_alignment(text, "x.phy").unwrap();
        assert_eq!(aln.taxa().len(), 3);
        assert_eq!(aln.taxa()[0], "long_taxon_name");
        assert_eq!(aln.site_count(), 3);
    }

    #[test]
    fn test_phylip_count_mismatch() {
        assert!(parse_alignment("3 3\na ATG\nb ATG\n", "x.phy").is_err());
        assert!(parse_alignment("1 6\na ATG\n", "x.phy").is_err());
        assert!(parse_alignment("x y\na ATG\n", "x.phy").is_err());
    }

    #[test]
    fn test_fasta_errors() {
        assert!(parse_alignment("", "x.fa").is_err());
        assert!(parse_alignment(">\nATG\n", "x.fa").is_err());
        assert!(parse_alignment(">a\nATGA\n", "x.fa").is_err());
    }

    #[test]
    fn test_read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">a\nATGTGG\n>b\nATGTGC").unwrap();
        let aln = read_alignment_file(file.path()).unwrap();
        assert_eq!(aln.site_count(), 2);
        assert!(aln.contains("b"));
    }
}
