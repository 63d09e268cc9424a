//! Handler results and the fixed customer-facing messages.

use std::fmt;

use serde::Serialize;

/// Refusal returned when a generated query fails the query gate.
pub const QUERY_REFUSED: &str = "Tôi không được phép thực hiện lệnh này.";
/// A valid query matched no rows.
pub const NO_MATCHING_DATA: &str = "Xin lỗi, không tìm thấy dữ liệu phù hợp.";
/// Any failure on the catalog path other than a refusal or an empty result.
pub const CATALOG_UNAVAILABLE: &str = "Xin lỗi, hệ thống không tìm thấy thông tin.";
/// No stored policy is similar enough to the question.
pub const NO_RELEVANT_POLICY: &str = "Xin lỗi, tôi không tìm thấy chính sách liên quan.";
/// The policy lookup itself failed.
pub const POLICY_MAINTENANCE: &str = "Đang bảo trì tính năng tra cứu.";
/// The model could not produce a conversational reply.
pub const CHITCHAT_UNAVAILABLE: &str = "Xin lỗi, tôi đang gặp sự cố, bạn thử lại sau nhé.";

/// Why a handler fell back to a fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    SchemaUnavailable,
    QueryGenerationFailed,
    QueryRejected,
    QueryFailed,
    NoRows,
    AnswerPhrasingFailed,
    EmbeddingFailed,
    PolicyLookupFailed,
    NoRelevantPolicy,
    ChitchatFailed,
}

impl DegradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradeReason::SchemaUnavailable => "schema_unavailable",
            DegradeReason::QueryGenerationFailed => "query_generation_failed",
            DegradeReason::QueryRejected => "query_rejected",
            DegradeReason::QueryFailed => "query_failed",
            DegradeReason::NoRows => "no_rows",
            DegradeReason::AnswerPhrasingFailed => "answer_phrasing_failed",
            DegradeReason::EmbeddingFailed => "embedding_failed",
            DegradeReason::PolicyLookupFailed => "policy_lookup_failed",
            DegradeReason::NoRelevantPolicy => "no_relevant_policy",
            DegradeReason::ChitchatFailed => "chitchat_failed",
        }
    }

    /// The message shown to the customer for this reason.
    pub fn message(&self) -> &'static str {
        match self {
            DegradeReason::QueryRejected => QUERY_REFUSED,
            DegradeReason::NoRows => NO_MATCHING_DATA,
            DegradeReason::SchemaUnavailable
            | DegradeReason::QueryGenerationFailed
            | DegradeReason::QueryFailed
            | DegradeReason::AnswerPhrasingFailed => CATALOG_UNAVAILABLE,
            DegradeReason::EmbeddingFailed | DegradeReason::PolicyLookupFailed => {
                POLICY_MAINTENANCE
            }
            DegradeReason::NoRelevantPolicy => NO_RELEVANT_POLICY,
            DegradeReason::ChitchatFailed => CHITCHAT_UNAVAILABLE,
        }
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Answered(String),
    Degraded(String, DegradeReason),
}

impl HandlerOutcome {
    /// A degraded outcome carrying the reason's fixed message.
    pub fn degraded(reason: DegradeReason) -> Self {
        HandlerOutcome::Degraded(reason.message().to_string(), reason)
    }

    pub fn text(&self) -> &str {
        match self {
            HandlerOutcome::Answered(text) | HandlerOutcome::Degraded(text, _) => text,
        }
    }

    pub fn reason(&self) -> Option<DegradeReason> {
        match self {
            HandlerOutcome::Answered(_) => None,
            HandlerOutcome::Degraded(_, reason) => Some(*reason),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            HandlerOutcome::Answered(text) | HandlerOutcome::Degraded(text, _) => text,
        }
    }
}
