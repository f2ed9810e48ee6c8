use std::collections::HashMap;

use anyhow::Result;

/// Character-level codec: every distinct character of the corpus is a token, numbered by
/// its rank in sorted order.
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    chars: Vec<char>,
    ids: HashMap<char, i64>,
}

impl CharTokenizer {
    pub fn from_text(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        let ids = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as i64))
            .collect();
        CharTokenizer { chars, ids }
    }

    pub fn vocab_size(&self) -> i64 {
        self.chars.len() as i64
    }

    pub fn encode(&self, text: &str) -> Result<Vec<i64>> {
        text.chars()
            .map(|c| {
                self.ids
                    .get(&c)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("Character not in vocabulary: {:?}", c))
            })
            .collect()
    }

    pub fn decode(&self, tokens: &[i64]) -> Result<String> {
        let mut text = String::with_capacity(tokens.len());
        for &token in tokens {
            let c = usize::try_from(token)
                .ok()
                .and_then(|i| self.chars.get(i))
                .ok_or_else(|| anyhow::anyhow!("Invalid token found: {}", token))?;
            text.push(*c);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer() -> Result<()> {
        let tokenizer = CharTokenizer::from_text("Hello, World!");
        let text = "World, Hello!";
        let tokens = tokenizer.encode(text)?;
        let decoded_text = tokenizer.decode(&tokens)?;
        assert_eq!(text, decoded_text);
        Ok(())
    }

    #[test]
    fn test_ids_follow_sorted_order() -> Result<()> {
        let tokenizer = CharTokenizer::from_text("cabbac\n");
        assert_eq!(tokenizer.vocab_size(), 4);
        assert_eq!(tokenizer.encode("\nabc")?, vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_unknown_character() {
        let tokenizer = CharTokenizer::from_text("abc");
        assert!(tokenizer.encode("abd").is_err());
    }

    #[test]
    fn test_invalid_token() {
        let tokenizer = CharTokenizer::from_text("abc");
        assert!(tokenizer.decode(&[0, 3]).is_err());
        assert!(tokenizer.decode(&[-1]).is_err());
    }
}
