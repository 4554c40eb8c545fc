use crate::controller::BaseError;
use crate::database::{get_connection, DbResult, ListResult};
use crate::schema::enum_def::{ChatStatus, ProviderType};
use crate::{db_entity, db_run};

db_entity! {
    #[derive(Queryable, Selectable, Identifiable)]
    #[diesel(table_name = chat_logs)]
    pub struct ChatLog {
        pub id: i64,
        pub name: String,
        pub provider_model: String,
        pub provider_name: String,
        pub status: ChatStatus,
        pub style: ProviderType,
        pub retry: i32,
        pub error: Option<String>,
        pub proxy_time: i64,
        pub first_chunk_time: Option<i64>,
        pub total_time: Option<i64>,
        pub prompt_tokens: i32,
        pub completion_tokens: i32,
        pub total_tokens: i32,
        pub created_at: i64,
        pub deleted_at: Option<i64>,
    }

    #[derive(Insertable)]
    #[diesel(table_name = chat_logs)]
    pub struct NewChatLog {
        pub name: String,
        pub provider_model: String,
        pub provider_name: String,
        pub status: ChatStatus,
        pub style: ProviderType,
        pub retry: i32,
        pub error: Option<String>,
        pub proxy_time: i64,
        pub created_at: i64,
    }

    #[derive(AsChangeset)]
    #[diesel(table_name = chat_logs)]
    pub struct ChatLogCompletion {
        pub first_chunk_time: Option<i64>,
        pub total_time: Option<i64>,
        pub prompt_tokens: i32,
        pub completion_tokens: i32,
        pub total_tokens: i32,
        pub error: Option<String>,
    }
}

impl NewChatLog {
    /// Turns an attempt skeleton into a failure record.
    pub fn with_error(mut self, error: String) -> Self {
        self.status = ChatStatus::Error;
        self.error = Some(error);
        self
    }
}

impl ChatLog {
    /// Appends a log row and returns its id. Success rows are inserted
    /// provisionally and enriched later via [`ChatLog::update_completion`].
    pub fn insert(new_log: &NewChatLog) -> DbResult<i64> {
        let conn = &mut get_connection();
        db_run!(conn, {
            diesel::insert_into(chat_logs::table)
                .values(NewChatLogRow::from_domain(new_log))
                .returning(chat_logs::dsl::id)
                .get_result::<i64>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to insert chat log: {}", e)))
                })
        })
    }

    /// Fills in the timing and token fields once the response stream ends.
    /// Called exactly once per success row, from the accounting task.
    pub fn update_completion(id: i64, completion: &ChatLogCompletion) -> DbResult<usize> {
        let conn = &mut get_connection();
        db_run!(conn, {
            diesel::update(chat_logs::table.find(id))
                .set(ChatLogCompletionRow::from_domain(completion))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to update chat log {}: {}", id, e)))
                })
        })
    }

    pub fn list(page: i64, page_size: i64) -> DbResult<ListResult<ChatLog>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let conn = &mut get_connection();
        db_run!(conn, {
            let total = chat_logs::table
                .filter(chat_logs::dsl::deleted_at.is_null())
                .count()
                .get_result::<i64>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to count chat logs: {}", e)))
                })?;

            let rows = chat_logs::table
                .filter(chat_logs::dsl::deleted_at.is_null())
                .order((chat_logs::dsl::created_at.desc(), chat_logs::dsl::id.desc()))
                .offset((page - 1) * page_size)
                .limit(page_size)
                .select(ChatLogRow::as_select())
                .load::<ChatLogRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to list chat logs: {}", e)))
                })?;

            Ok(ListResult {
                total,
                page,
                page_size,
                list: rows.into_iter().map(|r| r.into_domain()).collect(),
            })
        })
    }
}
