//! Code cleanliness rating.
//!
//! A best-effort annotation: the completion model is asked for a single
//! number from 1 to 10. Anything that does not parse as a number in that
//! range becomes [`DEFAULT_RATING`], and so does a failed completion call.
//! Rating never fails ingestion.

use crate::completion::CompletionProvider;
use crate::error::RatingParseError;

pub const DEFAULT_RATING: f64 = 5.0;
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;

/// Rubric prompt sent with the code payload.
pub fn rating_prompt(code: &str) -> String {
    format!(
        "Please rate the cleanliness of the following code on a scale from 1 to 10, \
         where 1 is very messy and 10 is very clean. Provide only the numerical rating. \
         The output should only be 1 number from 1 to 10 nothing else, no explanation.\n\n\
         Code:\n{}\n\nRating (1-10):",
        code
    )
}

/// Parse a model reply as a rating.
pub fn parse_rating(reply: &str) -> Result<f64, RatingParseError> {
    let trimmed = reply.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| RatingParseError::NotANumber(trimmed.to_string()))?;
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
        return Err(RatingParseError::OutOfRange(value));
    }
    Ok(value)
}

/// Ask the completion provider to rate `code`, falling back to [`DEFAULT_RATING`].
pub async fn rate_cleanliness(provider: &dyn CompletionProvider, model: &str, code: &str) -> f64 {
    let reply = match provider.complete(model, &rating_prompt(code)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "cleanliness rating call failed; using default");
            return DEFAULT_RATING;
        }
    };

    match parse_rating(&reply) {
        Ok(rating) => rating,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable cleanliness rating; using default");
            DEFAULT_RATING
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionProvider for Fixed {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionProvider for Failing {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, CompletionError> {
            Err(CompletionError::Request("boom".into()))
        }
    }

    #[test]
    fn test_parse_valid_ratings() {
        assert_eq!(parse_rating("7").unwrap(), 7.0);
        assert_eq!(parse_rating("  8.5\n").unwrap(), 8.5);
        assert_eq!(parse_rating("1").unwrap(), 1.0);
        assert_eq!(parse_rating("10").unwrap(), 10.0);
    }

    #[test]
    fn test_parse_rejects_text_and_out_of_range() {
        assert!(matches!(
            parse_rating("Rating: 7"),
            Err(RatingParseError::NotANumber(_))
        ));
        assert_eq!(parse_rating("11"), Err(RatingParseError::OutOfRange(11.0)));
        assert_eq!(parse_rating("0"), Err(RatingParseError::OutOfRange(0.0)));
        assert!(parse_rating("NaN").is_err());
    }

    #[test]
    fn test_prompt_contains_code() {
        let prompt = rating_prompt("print(1)");
        assert!(prompt.contains("Code:\nprint(1)\n\nRating (1-10):"));
    }

    #[tokio::test]
    async fn test_non_numeric_reply_defaults() {
        for _ in 0..3 {
            let rating = rate_cleanliness(&Fixed("looks pretty clean to me"), "m", "x = 1").await;
            assert_eq!(rating, DEFAULT_RATING);
        }
    }

    #[tokio::test]
    async fn test_failed_call_defaults() {
        assert_eq!(rate_cleanliness(&Failing, "m", "x").await, DEFAULT_RATING);
    }

    #[tokio::test]
    async fn test_numeric_reply_is_used() {
        assert_eq!(rate_cleanliness(&Fixed("9"), "m", "x").await, 9.0);
    }
}
