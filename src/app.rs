//! Application state management for coindeck
//!
//! This module contains the main application state, handling keyboard input,
//! data loading through the store facade, and state transitions between the
//! market table, coin detail, compare, and watchlist views.

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use std::collections::HashMap;

use crate::cli::{StartView, StartupConfig};
use crate::data::{CoinSeries, MarketEntry};
use crate::store::CryptoStore;
use crate::watchlist::Watchlist;

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Initial loading state while fetching data
    Loading,
    /// Market overview table
    MarketTable,
    /// Detail view for a specific coin
    CoinDetail(String),
    /// Multi-coin comparison view
    Compare,
    /// Watchlist view
    Watchlist,
}

/// Deferred work the main loop performs between renders
///
/// Key handling never awaits; it records an action and the event loop drives
/// the corresponding store call afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Open the detail view for a coin, fetching its series
    OpenCoin(String),
    /// Resolve a search query to a coin id and open it
    ResolveSearch(String),
    /// Fetch series for the current comparison selection
    LoadCompare,
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Index of the currently selected row in table views
    pub selected_index: usize,
    /// Cached market rows as last read from the store
    pub market_rows: Vec<MarketEntry>,
    /// Ordered comparison selection, at most five ids
    pub compare_selection: Vec<String>,
    /// Series fetched for the comparison selection
    pub compare_series: HashMap<String, CoinSeries>,
    /// Series shown in the detail view
    pub detail_series: Option<CoinSeries>,
    /// Active search input; `Some` while the search bar is open
    pub search_input: Option<String>,
    /// One-line status message shown in the footer
    pub status_message: Option<String>,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show the help overlay
    pub show_help: bool,
    /// Timestamp of the last completed refresh
    pub last_refresh: Option<DateTime<Local>>,
    /// Flag indicating a full refresh has been requested
    pub refresh_requested: bool,
    /// Deferred store work recorded by key handling
    pub pending: Option<PendingAction>,
    /// The persisted watchlist id set
    pub watchlist: Watchlist,
    /// The view to enter once the initial load completes
    start_view: StartView,
    /// The store facade all data access goes through
    store: CryptoStore,
}

impl App {
    /// Creates a new App around a store and watchlist
    pub fn new(store: CryptoStore, watchlist: Watchlist) -> Self {
        Self {
            state: AppState::Loading,
            selected_index: 0,
            market_rows: Vec::new(),
            compare_selection: Vec::new(),
            compare_series: HashMap::new(),
            detail_series: None,
            search_input: None,
            status_message: None,
            should_quit: false,
            show_help: false,
            last_refresh: None,
            refresh_requested: false,
            pending: None,
            watchlist,
            start_view: StartView::Market,
            store,
        }
    }

    /// Creates a new App with the given startup configuration applied
    pub fn with_startup_config(store: CryptoStore, watchlist: Watchlist, config: StartupConfig) -> Self {
        let mut app = Self::new(store, watchlist);
        app.start_view = config.start_view;
        app.compare_selection = config.compare_ids;
        app
    }

    /// Read-only access to the store for rendering
    pub fn store(&self) -> &CryptoStore {
        &self.store
    }

    /// The market rows visible in the current view
    ///
    /// The watchlist view shows the market table filtered to watched ids;
    /// every other table view shows all rows.
    pub fn visible_rows(&self) -> Vec<&MarketEntry> {
        match self.state {
            AppState::Watchlist => self
                .market_rows
                .iter()
                .filter(|row| self.watchlist.contains(&row.id))
                .collect(),
            _ => self.market_rows.iter().collect(),
        }
    }

    /// The currently selected market row, if any
    pub fn selected_row(&self) -> Option<&MarketEntry> {
        self.visible_rows().get(self.selected_index).copied()
    }

    /// Loads the initial data and transitions to the startup view
    ///
    /// Market rows and the coin list load concurrently; a failure leaves the
    /// corresponding resource empty with its error recorded in the store.
    pub async fn load_initial(&mut self) {
        let (market, _coins) = tokio::join!(
            self.store.market_data(false),
            self.store.coin_list(false)
        );
        if let Err(ref err) = market {
            self.status_message = Some(format!("Market data unavailable: {}", err));
        }
        self.market_rows = self.store.market_cached().unwrap_or_default();
        self.last_refresh = Some(Local::now());

        match std::mem::take(&mut self.start_view) {
            StartView::Market => {
                self.state = AppState::MarketTable;
            }
            StartView::Coin(id) => {
                self.state = AppState::MarketTable;
                self.pending = Some(PendingAction::OpenCoin(id));
            }
            StartView::Compare => {
                self.state = AppState::Compare;
                if !self.compare_selection.is_empty() {
                    self.pending = Some(PendingAction::LoadCompare);
                }
            }
            StartView::Watchlist => {
                self.state = AppState::Watchlist;
            }
        }
    }

    /// Drives any deferred work recorded by key handling
    ///
    /// Called from the event loop after input is processed. At most one
    /// action plus an optional full refresh runs per iteration.
    pub async fn process_pending(&mut self) {
        if let Some(action) = self.pending.take() {
            match action {
                PendingAction::OpenCoin(id) => self.open_coin(id).await,
                PendingAction::ResolveSearch(query) => self.resolve_search(&query).await,
                PendingAction::LoadCompare => self.load_compare(false).await,
            }
        }

        if self.refresh_requested {
            self.refresh_requested = false;
            self.store.refresh_all().await;
            self.market_rows = self.store.market_cached().unwrap_or_default();
            self.clamp_selection();
            self.last_refresh = Some(Local::now());
            if let Some(err) = self.store.market_error() {
                self.status_message = Some(format!("Refresh failed: {}", err));
            } else {
                self.status_message = None;
            }
        }
    }

    /// Opens the detail view for a coin and fetches its series
    async fn open_coin(&mut self, id: String) {
        self.state = AppState::CoinDetail(id.clone());
        match self.store.coin_series(&id, false).await {
            Ok(series) => {
                self.detail_series = Some(series);
                self.status_message = None;
            }
            Err(err) => {
                // Stale data stays on screen; the footer carries the error
                self.detail_series = self.store.series_cached(&id);
                self.status_message = Some(format!("Chart unavailable: {}", err));
            }
        }
    }

    /// Resolves a search query against the coin list and opens the match
    async fn resolve_search(&mut self, query: &str) {
        if self.store.coin_list(false).await.is_err() && self.store.coin_list_cached().is_none() {
            let detail = self
                .store
                .coin_list_error()
                .unwrap_or_else(|| "unknown error".to_string());
            self.status_message = Some(format!("Coin list unavailable: {}", detail));
            return;
        }

        match self.store.find_coin_id(query) {
            Some(id) => {
                self.status_message = None;
                self.open_coin(id).await;
            }
            None => {
                self.status_message = Some(format!("Coin not found: {}", query.trim()));
            }
        }
    }

    /// Fetches series for the comparison selection
    async fn load_compare(&mut self, force: bool) {
        if self.compare_selection.is_empty() {
            self.compare_series.clear();
            return;
        }
        self.compare_series = self
            .store
            .multi_coin_series(&self.compare_selection, force)
            .await;

        let errors = self.store.compare_errors();
        let failed: Vec<&String> = self
            .compare_selection
            .iter()
            .filter(|id| errors.contains_key(*id))
            .collect();
        if failed.is_empty() {
            self.status_message = None;
        } else {
            let names: Vec<&str> = failed.iter().map(|id| id.as_str()).collect();
            self.status_message = Some(format!("No data for: {}", names.join(", ")));
        }
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q`: Quit the application (outside search input)
    /// - `Up`/`k`, `Down`/`j`: Move selection in table views
    /// - `Enter`: Open the selected coin's detail view
    /// - `/`: Open the search bar (market table)
    /// - `c`: Open the compare view; `Space` toggles a coin there
    /// - `w`: Open the watchlist view; `b` toggles the watchlist flag
    /// - `r`: Refresh market data and coin list
    /// - `?`: Toggle the help overlay; `Esc`: Close/back
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                }
                _ => {} // Ignore other keys when help is shown
            }
            return;
        }

        // The search bar captures input before view-level bindings
        if self.search_input.is_some() {
            self.handle_search_key(key_event);
            return;
        }

        match self.state {
            AppState::Loading => {
                // Only quit is allowed during loading
                if key_event.code == KeyCode::Char('q') {
                    self.should_quit = true;
                }
            }
            AppState::MarketTable => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_up();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_down();
                }
                KeyCode::Enter => {
                    if let Some(row) = self.selected_row() {
                        self.pending = Some(PendingAction::OpenCoin(row.id.clone()));
                    }
                }
                KeyCode::Char('/') => {
                    self.search_input = Some(String::new());
                    self.status_message = None;
                }
                KeyCode::Char('c') => {
                    self.selected_index = 0;
                    self.state = AppState::Compare;
                }
                KeyCode::Char('w') => {
                    self.selected_index = 0;
                    self.state = AppState::Watchlist;
                }
                KeyCode::Char('b') => {
                    self.toggle_selected_watchlist();
                }
                KeyCode::Char('r') => {
                    self.refresh_requested = true;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::CoinDetail(_) => match key_event.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Esc => {
                    self.detail_series = None;
                    self.status_message = None;
                    self.state = AppState::MarketTable;
                }
                KeyCode::Char('b') => {
                    if let AppState::CoinDetail(ref id) = self.state {
                        let id = id.clone();
                        self.toggle_watchlist_for(&id);
                    }
                }
                KeyCode::Char('r') => {
                    if let AppState::CoinDetail(ref id) = self.state {
                        self.pending = Some(PendingAction::OpenCoin(id.clone()));
                    }
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::Compare => match key_event.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Esc => {
                    self.selected_index = 0;
                    self.state = AppState::MarketTable;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_up();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_down();
                }
                KeyCode::Char(' ') => {
                    self.toggle_compare_selection();
                }
                KeyCode::Enter => {
                    if !self.compare_selection.is_empty() {
                        self.pending = Some(PendingAction::LoadCompare);
                    }
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::Watchlist => match key_event.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Esc => {
                    self.selected_index = 0;
                    self.state = AppState::MarketTable;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_up();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_down();
                }
                KeyCode::Enter => {
                    if let Some(row) = self.selected_row() {
                        self.pending = Some(PendingAction::OpenCoin(row.id.clone()));
                    }
                }
                KeyCode::Char('b') => {
                    self.toggle_selected_watchlist();
                    self.clamp_selection();
                }
                KeyCode::Char('r') => {
                    self.refresh_requested = true;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
        }
    }

    /// Handles keys while the search bar is open
    fn handle_search_key(&mut self, key_event: KeyEvent) {
        let Some(ref mut input) = self.search_input else {
            return;
        };
        match key_event.code {
            KeyCode::Esc => {
                self.search_input = None;
            }
            KeyCode::Enter => {
                let query = input.trim().to_string();
                self.search_input = None;
                if !query.is_empty() {
                    self.pending = Some(PendingAction::ResolveSearch(query));
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => {
                input.push(c);
            }
            _ => {}
        }
    }

    /// Toggles the watchlist flag of the currently selected row
    fn toggle_selected_watchlist(&mut self) {
        if let Some(id) = self.selected_row().map(|row| row.id.clone()) {
            self.toggle_watchlist_for(&id);
        }
    }

    fn toggle_watchlist_for(&mut self, id: &str) {
        if self.watchlist.toggle(id) {
            self.status_message = Some(format!("Added {} to watchlist", id));
        } else {
            self.status_message = Some(format!("Removed {} from watchlist", id));
        }
    }

    /// Toggles the selected coin in or out of the comparison set
    fn toggle_compare_selection(&mut self) {
        let Some(id) = self.selected_row().map(|row| row.id.clone()) else {
            return;
        };
        if let Some(pos) = self.compare_selection.iter().position(|s| *s == id) {
            self.compare_selection.remove(pos);
            self.compare_series.remove(&id);
        } else if self.compare_selection.len() < 5 {
            self.compare_selection.push(id);
        } else {
            self.status_message = Some("Comparison is limited to 5 coins".to_string());
        }
    }

    /// Moves the selection up in the list, wrapping to bottom if at top
    fn move_selection_up(&mut self) {
        let count = self.visible_rows().len();
        if count == 0 {
            return;
        }
        if self.selected_index == 0 {
            self.selected_index = count - 1;
        } else {
            self.selected_index -= 1;
        }
    }

    /// Moves the selection down in the list, wrapping to top if at bottom
    fn move_selection_down(&mut self) {
        let count = self.visible_rows().len();
        if count == 0 {
            return;
        }
        self.selected_index = (self.selected_index + 1) % count;
    }

    /// Keeps the selection inside the visible row range after changes
    fn clamp_selection(&mut self) {
        let count = self.visible_rows().len();
        if count == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= count {
            self.selected_index = count - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ApiError, CoinListEntry, MarketDataSource, SeriesPoint};
    use crate::store::{ManualClock, StoreConfig};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use crossterm::event::{KeyEvent, KeyModifiers};
    use std::sync::Arc;

    struct StubSource;

    #[async_trait]
    impl MarketDataSource for StubSource {
        async fn market_snapshot(&self) -> Result<Vec<MarketEntry>, ApiError> {
            Ok(vec![
                market_row("bitcoin", "Bitcoin", "btc"),
                market_row("ethereum", "Ethereum", "eth"),
                market_row("solana", "Solana", "sol"),
            ])
        }

        async fn coin_list(&self) -> Result<Vec<CoinListEntry>, ApiError> {
            Ok(vec![CoinListEntry {
                id: "bitcoin".to_string(),
                name: "Bitcoin".to_string(),
                symbol: "btc".to_string(),
            }])
        }

        async fn coin_series(&self, id: &str, _days: u32) -> Result<CoinSeries, ApiError> {
            Ok(CoinSeries {
                id: id.to_string(),
                prices: vec![SeriesPoint {
                    time: Utc.with_ymd_and_hms(2026, 8, 1, 11, 0, 0).unwrap(),
                    value: 100.0,
                }],
                market_caps: Vec::new(),
                total_volumes: Vec::new(),
            })
        }
    }

    fn market_row(id: &str, name: &str, symbol: &str) -> MarketEntry {
        MarketEntry {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            image: String::new(),
            current_price: 100.0,
            price_change_percentage_24h: 0.5,
            market_cap: 1.0e9,
            total_volume: 1.0e8,
            ath_change_percentage: -5.0,
            circulating_supply: 1.0e6,
        }
    }

    fn test_app() -> App {
        let store = CryptoStore::with_parts(
            Arc::new(StubSource),
            Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
            )),
            None,
            StoreConfig::default(),
        );
        App::new(store, Watchlist::load_from(None))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn test_load_initial_transitions_to_market_table() {
        let mut app = test_app();
        assert_eq!(app.state, AppState::Loading);

        app.load_initial().await;

        assert_eq!(app.state, AppState::MarketTable);
        assert_eq!(app.market_rows.len(), 3);
    }

    #[tokio::test]
    async fn test_selection_wraps_in_both_directions() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected_index, 2, "Up from top wraps to bottom");

        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_index, 0, "Down from bottom wraps to top");
    }

    #[tokio::test]
    async fn test_enter_defers_open_coin_action() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            app.pending,
            Some(PendingAction::OpenCoin("bitcoin".to_string()))
        );

        app.process_pending().await;
        assert_eq!(app.state, AppState::CoinDetail("bitcoin".to_string()));
        assert!(app.detail_series.is_some());
    }

    #[tokio::test]
    async fn test_search_input_editing_and_submit() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Char('/')));
        assert_eq!(app.search_input.as_deref(), Some(""));

        app.handle_key(key(KeyCode::Char('b')));
        app.handle_key(key(KeyCode::Char('t')));
        app.handle_key(key(KeyCode::Char('x')));
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Char('c')));
        assert_eq!(app.search_input.as_deref(), Some("btc"));

        app.handle_key(key(KeyCode::Enter));
        assert!(app.search_input.is_none());
        assert_eq!(
            app.pending,
            Some(PendingAction::ResolveSearch("btc".to_string()))
        );

        app.process_pending().await;
        assert_eq!(app.state, AppState::CoinDetail("bitcoin".to_string()));
    }

    #[tokio::test]
    async fn test_search_miss_sets_status_message() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Char('/')));
        for c in "nonexistent".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        app.process_pending().await;

        assert_eq!(app.state, AppState::MarketTable);
        let message = app.status_message.as_deref().expect("Miss should report");
        assert!(message.contains("not found"));
    }

    #[tokio::test]
    async fn test_search_captures_quit_key() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Char('/')));
        app.handle_key(key(KeyCode::Char('q')));

        assert!(!app.should_quit, "Typing q into the search bar must not quit");
        assert_eq!(app.search_input.as_deref(), Some("q"));
    }

    #[tokio::test]
    async fn test_compare_selection_toggle_and_cap() {
        let mut app = test_app();
        app.load_initial().await;
        app.handle_key(key(KeyCode::Char('c')));
        assert_eq!(app.state, AppState::Compare);

        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.compare_selection, vec!["bitcoin".to_string()]);

        // Toggling again removes the coin
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.compare_selection.is_empty());
    }

    #[tokio::test]
    async fn test_compare_enter_loads_series() {
        let mut app = test_app();
        app.load_initial().await;
        app.handle_key(key(KeyCode::Char('c')));

        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.compare_selection.len(), 2);

        app.handle_key(key(KeyCode::Enter));
        app.process_pending().await;

        assert_eq!(app.compare_series.len(), 2);
        assert!(app.compare_series.contains_key("bitcoin"));
        assert!(app.compare_series.contains_key("ethereum"));
    }

    #[tokio::test]
    async fn test_watchlist_view_filters_rows() {
        let mut app = test_app();
        app.load_initial().await;

        // Watch ethereum from the market table
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char('b')));
        assert!(app.watchlist.contains("ethereum"));

        app.handle_key(key(KeyCode::Char('w')));
        assert_eq!(app.state, AppState::Watchlist);

        let rows = app.visible_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "ethereum");
    }

    #[tokio::test]
    async fn test_refresh_key_sets_flag_and_process_clears_it() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Char('r')));
        assert!(app.refresh_requested);

        app.process_pending().await;
        assert!(!app.refresh_requested);
        assert!(app.last_refresh.is_some());
    }

    #[tokio::test]
    async fn test_help_overlay_intercepts_keys() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Char('?')));
        assert!(app.show_help);

        // Navigation is ignored while help is shown
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_index, 0);

        app.handle_key(key(KeyCode::Esc));
        assert!(!app.show_help);
    }

    #[tokio::test]
    async fn test_startup_config_opens_compare_with_ids() {
        let store = CryptoStore::with_parts(
            Arc::new(StubSource),
            Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
            )),
            None,
            StoreConfig::default(),
        );
        let config = StartupConfig {
            start_view: StartView::Compare,
            compare_ids: vec!["bitcoin".to_string(), "ethereum".to_string()],
            days: 7,
            auto_refresh: true,
        };
        let mut app = App::with_startup_config(store, Watchlist::load_from(None), config);

        app.load_initial().await;
        assert_eq!(app.state, AppState::Compare);

        app.process_pending().await;
        assert_eq!(app.compare_series.len(), 2);
    }

    #[tokio::test]
    async fn test_escape_from_detail_returns_to_market() {
        let mut app = test_app();
        app.load_initial().await;

        app.handle_key(key(KeyCode::Enter));
        app.process_pending().await;
        assert!(matches!(app.state, AppState::CoinDetail(_)));

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.state, AppState::MarketTable);
        assert!(app.detail_series.is_none());
    }
}
