use thiserror::Error;

/// Reason a ledger fails its integrity check. The `Display` form is the stable,
/// greppable code printed after `FAIL_REASON=`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerViolation {
    #[error("LEDGER_APPEND_ONLY_REQUIRED")]
    AppendOnlyRequired,
    #[error("LEDGER_SCHEMA_UNSUPPORTED:{0}")]
    SchemaUnsupported(u32),
    #[error("ENTRY_SHAPE_INVALID:{index}")]
    EntryShapeInvalid { index: usize },
    #[error("ENTRY_TYPE_INVALID:{index}")]
    EntryTypeInvalid { index: usize },
    #[error("ENTRY_ID_MISSING:{index}")]
    EntryIdMissing { index: usize },
    #[error("ENTRY_ID_DUPLICATE:{entry_id}:{index}")]
    EntryIdDuplicate { entry_id: String, index: usize },
    #[error("ENTRY_PREV_HASH_MISMATCH:{index}")]
    PrevHashMismatch { index: usize },
    #[error("ENTRY_HASH_MISMATCH:{index}")]
    EntryHashMismatch { index: usize },
    #[error("ENTRY_EXIT_REQUIRES_P0_AND_RULE:{index}")]
    ExitRequiresP0AndRule { index: usize },
    #[error("ENTRY_SIGNOFF_REQUIRES_REF:{index}")]
    SignoffRequiresRef { index: usize },
    #[error("ENTRY_SIGNOFF_REF_MISSING:{ref_entry_id}:{index}")]
    SignoffRefMissing { ref_entry_id: String, index: usize },
    #[error("ENTRY_SIGNOFF_REF_NOT_EARLIER:{ref_entry_id}:{index}")]
    SignoffRefNotEarlier { ref_entry_id: String, index: usize },
    #[error("ENTRY_SIGNOFF_NOT_APPROVED:{index}")]
    SignoffNotApproved { index: usize },
    #[error("ENTRY_CLOSE_REQUIRES_{field}:{index}")]
    CloseRequires { field: &'static str, index: usize },
    #[error("WAIVER_INVALID:{field}:{index}")]
    WaiverInvalid { field: &'static str, index: usize },
    #[error("WAIVER_TTL_EXPIRED:{gate_id}:{index}")]
    WaiverTtlExpired { gate_id: String, index: usize },
}

/// Every failure the CLI can report. `main` prints the `Display` form verbatim as
/// `FAIL_REASON=<code>`; upstream automation greps these strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailReason {
    #[error("MODE_REQUIRED")]
    ModeRequired,
    #[error("UNKNOWN_ARG:{0}")]
    UnknownArg(String),
    #[error("ARG_REQUIRED:{0}")]
    ArgRequired(String),
    #[error("ARG_INVALID:{0}")]
    ArgInvalid(String),
    #[error("CONFIG_INVALID:{0}")]
    ConfigInvalid(String),
    #[error("WAIVER_REGISTRY_INVALID")]
    WaiverRegistryInvalid,
    #[error("LEDGER_JSON_INVALID")]
    LedgerJsonInvalid,
    #[error("LEDGER_INVALID:{0}")]
    LedgerInvalid(LedgerViolation),
    #[error("LEDGER_INVALID_AFTER_RECORD:{0}")]
    LedgerInvalidAfterRecord(LedgerViolation),
    #[error("ENTRY_TYPE_INVALID")]
    EntryTypeInvalid,
    #[error("ENTRY_EXIT_REQUIRES_P0_AND_RULE")]
    ExitRequiresP0AndRule,
    #[error("ENTRY_SIGNOFF_REQUIRES_REF")]
    SignoffRequiresRef,
    #[error("ENTRY_CLOSE_REQUIRES_{0}")]
    CloseRequires(&'static str),
    #[error("HO_SIGNOFF_INVALID")]
    HoSignoffInvalid,
    #[error("RUN_RESULT_MISSING")]
    RunResultMissing,
    #[error("RUN_RESULT_INVALID")]
    RunResultInvalid,
    #[error("RUN_ID_COLLISION:{0}")]
    RunIdCollision(String),
}

/// Resolves the stable reason code for any error produced by a command.
pub fn reason_code(err: &anyhow::Error) -> String {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FailReason>())
        .map(ToString::to_string)
        .unwrap_or_else(|| "IO_ERROR".to_string())
}
