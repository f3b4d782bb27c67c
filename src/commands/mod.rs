use anyhow::Result;
use poise::CreateReply;

use crate::leveling::LevelingError;
use crate::state::Ctx;

pub mod help;
pub mod levelconfig;
pub mod rank;

pub const MAX_EMBED_DESCRIPTION_CHARS: usize = 4096;

/// Split lines into description chunks, each <= max_chars (counted in Unicode scalar values).
pub fn chunk_lines(lines: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in lines {
        let line_len = line.chars().count();
        // +1 for the newline if current is not empty
        let extra = if current.is_empty() {
            line_len
        } else {
            line_len + 1
        };

        if current_len + extra > max_chars {
            if !current.is_empty() {
                chunks.push(current);
            }
            current = line.clone();
            current_len = line_len;
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += extra;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Send `lines` as one embed, or several when they overflow a description.
/// `build_first` gets the first chunk, `build_cont` gets `(index, chunk)` for the rest.
pub async fn send_chunked_embeds<BF, BC>(
    ctx: Ctx<'_>,
    lines: Vec<String>,
    build_first: BF,
    build_cont: BC,
) -> Result<()>
where
    BF: FnOnce(String) -> serenity::all::CreateEmbed,
    BC: Fn(usize, String) -> serenity::all::CreateEmbed,
{
    let mut chunks = chunk_lines(&lines, MAX_EMBED_DESCRIPTION_CHARS).into_iter();
    let Some(first) = chunks.next() else {
        return Ok(());
    };
    ctx.send(CreateReply::default().embed(build_first(first))).await?;

    for (idx, chunk) in chunks.enumerate() {
        ctx.send(CreateReply::default().embed(build_cont(idx + 1, chunk)))
            .await?;
    }

    Ok(())
}

/// Validation and not-found errors become an ephemeral `❌` reply; storage errors propagate.
pub async fn reply_rejection(ctx: Ctx<'_>, err: LevelingError) -> Result<()> {
    let msg = match err {
        LevelingError::Validation(msg) | LevelingError::NotFound(msg) => msg,
        LevelingError::Storage(e) => return Err(e),
    };
    ctx.send(
        CreateReply::default()
            .content(format!("❌ {msg}"))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// `1234567` -> `1,234,567`.
pub fn with_commas(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commas() {
        assert_eq!(with_commas(0), "0");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(1_000), "1,000");
        assert_eq!(with_commas(1_234_567), "1,234,567");
        assert_eq!(with_commas(-70), "-70");
        assert_eq!(with_commas(-12_345), "-12,345");
    }

    #[test]
    fn chunking_respects_the_limit() {
        let lines: Vec<String> = (0..5).map(|i| format!("line {i}")).collect();
        assert_eq!(chunk_lines(&lines, 100), vec![lines.join("\n")]);

        let chunks = chunk_lines(&lines, 13);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 13));
        assert!(chunk_lines(&[], 10).is_empty());
    }
}
