use crate::error::QueryError;

/// Observable state of one query.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<QueryError>,
    /// A fetch is running and there is no data to show yet
    pub is_loading: bool,
    /// A fetch is running, with or without data to show
    pub is_fetching: bool,
    /// Unix millis of the fetch that produced `data`
    pub data_updated_at: Option<i64>,
}

impl<T> QueryState<T> {
    /// Nothing fetched and nothing running; also the state of a disabled query.
    pub fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_fetching: false,
            data_updated_at: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.data.is_none() && self.error.is_none() && !self.is_fetching
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Data if present, otherwise the error; `Ok(None)` when idle.
    pub fn into_result(self) -> Result<Option<T>, QueryError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(Some(data)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(None),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            data: self.data.map(f),
            error: self.error,
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            data_updated_at: self.data_updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}
