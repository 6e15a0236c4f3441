//! Domain models

pub mod exam;
pub mod exercise;
pub mod record;
pub mod solution;
pub mod submission;
pub mod test_case;

pub use exam::Exam;
pub use exercise::Exercise;
pub use record::ExecutionRecord;
pub use solution::ExerciseSolution;
pub use submission::Submission;
pub use test_case::TestCase;

/// Serialize `chrono::Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::milliseconds)
    }

    pub mod option {
        use chrono::Duration;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => serializer.serialize_some(&duration.num_milliseconds()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<i64>::deserialize(deserializer).map(|ms| ms.map(Duration::milliseconds))
        }
    }
}
