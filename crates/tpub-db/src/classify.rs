use sqlx::mysql::MySqlDatabaseError;
use tpub_reconcile::FetchErrorKind;

// MySQL server / client error numbers.
const ER_NO_SUCH_TABLE: u16 = 1146;
const ER_BAD_FIELD_ERROR: u16 = 1054;
const ER_CON_COUNT_ERROR: u16 = 1040;
const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_BAD_DB_ERROR: u16 = 1049;
const ER_HOST_IS_BLOCKED: u16 = 1129;
const ER_HOST_NOT_PRIVILEGED: u16 = 1130;
const ER_NET_READ_ERROR: u16 = 1158;
const ER_NET_WRITE_INTERRUPTED: u16 = 1161;
const CR_CONNECTION_ERROR: u16 = 2002;
const CR_CONN_HOST_ERROR: u16 = 2003;
const CR_SERVER_GONE_ERROR: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

/// Classify a driver error.
pub fn classify(err: &sqlx::Error) -> FetchErrorKind {
    match err {
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number());
            classify_mysql(number, db.code().as_deref())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => FetchErrorKind::Connectivity,
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnDecode { .. } => FetchErrorKind::SchemaMismatch,
        _ => FetchErrorKind::Other,
    }
}

/// Classify a server-reported error by MySQL error number, falling back to
/// SQLSTATE when the number is unavailable or unrecognised.
pub fn classify_mysql(number: Option<u16>, sqlstate: Option<&str>) -> FetchErrorKind {
    match number {
        Some(ER_NO_SUCH_TABLE) => return FetchErrorKind::SchemaMissing,
        Some(ER_BAD_FIELD_ERROR) => return FetchErrorKind::SchemaMismatch,
        Some(
            ER_CON_COUNT_ERROR
            | ER_DBACCESS_DENIED_ERROR
            | ER_ACCESS_DENIED_ERROR
            | ER_BAD_DB_ERROR
            | ER_HOST_IS_BLOCKED
            | ER_HOST_NOT_PRIVILEGED
            | ER_NET_READ_ERROR..=ER_NET_WRITE_INTERRUPTED
            | CR_CONNECTION_ERROR
            | CR_CONN_HOST_ERROR
            | CR_SERVER_GONE_ERROR
            | CR_SERVER_LOST,
        ) => return FetchErrorKind::Connectivity,
        _ => {}
    }

    match sqlstate {
        Some("42S02") => FetchErrorKind::SchemaMissing,
        Some("42S22") => FetchErrorKind::SchemaMismatch,
        Some("28000") => FetchErrorKind::Connectivity,
        Some(s) if s.starts_with("08") => FetchErrorKind::Connectivity,
        _ => FetchErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_by_number_or_state() {
        assert_eq!(
            classify_mysql(Some(1146), Some("42S02")),
            FetchErrorKind::SchemaMissing
        );
        assert_eq!(classify_mysql(None, Some("42S02")), FetchErrorKind::SchemaMissing);
    }

    #[test]
    fn unknown_column_by_number_or_state() {
        assert_eq!(
            classify_mysql(Some(1054), Some("42S22")),
            FetchErrorKind::SchemaMismatch
        );
        assert_eq!(classify_mysql(None, Some("42S22")), FetchErrorKind::SchemaMismatch);
    }

    #[test]
    fn access_and_link_errors_are_connectivity() {
        for n in [1040, 1044, 1045, 1049, 1130, 1159, 2003, 2013] {
            assert_eq!(
                classify_mysql(Some(n), Some("HY000")),
                FetchErrorKind::Connectivity,
                "error {n}"
            );
        }
        assert_eq!(classify_mysql(None, Some("08S01")), FetchErrorKind::Connectivity);
        assert_eq!(classify_mysql(None, Some("28000")), FetchErrorKind::Connectivity);
    }

    #[test]
    fn syntax_and_unknown_errors_are_other() {
        assert_eq!(classify_mysql(Some(1064), Some("42000")), FetchErrorKind::Other);
        assert_eq!(classify_mysql(None, None), FetchErrorKind::Other);
    }

    #[test]
    fn transport_variants_are_connectivity() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(classify(&io), FetchErrorKind::Connectivity);
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), FetchErrorKind::Connectivity);
    }

    #[test]
    fn missing_result_column_is_schema_mismatch() {
        let err = sqlx::Error::ColumnNotFound("value".to_string());
        assert_eq!(classify(&err), FetchErrorKind::SchemaMismatch);
    }

    #[test]
    fn row_not_found_is_other() {
        assert_eq!(classify(&sqlx::Error::RowNotFound), FetchErrorKind::Other);
    }
}
