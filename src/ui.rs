use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

use sleek::{LocalProgram, SleekApp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Sleek,
    Rewards,
    Account,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Home => Page::Sleek,
            Page::Sleek => Page::Rewards,
            Page::Rewards => Page::Account,
            Page::Account => Page::Home,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Home => Page::Account,
            Page::Sleek => Page::Home,
            Page::Rewards => Page::Sleek,
            Page::Account => Page::Rewards,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Home => "Home",
            Page::Sleek => "Sleek",
            Page::Rewards => "Rewards",
            Page::Account => "Account",
        }
    }
}

const PAGES: [Page; 4] = [Page::Home, Page::Sleek, Page::Rewards, Page::Account];

pub struct App {
    pub app: SleekApp<LocalProgram>,
    pub state: TableState,
    pub current_page: Page,
    /// Outcome of the last action, shown in the status bar
    pub message: Option<String>,
}

impl App {
    pub fn new(app: SleekApp<LocalProgram>) -> Self {
        let mut ui_app = Self {
            app,
            state: TableState::default(),
            current_page: Page::Home,
            message: None,
        };
        ui_app.reset_selection();
        ui_app
    }

    /// Rows on the current page
    pub fn row_count(&self, now: DateTime<Utc>) -> usize {
        match self.current_page {
            Page::Home => self.app.catalog().count(),
            Page::Sleek => self.app.active_subscriptions(now).len(),
            Page::Rewards => self.app.ledger().len(),
            Page::Account => self.app.book().len(),
        }
    }

    fn reset_selection(&mut self) {
        if self.row_count(Utc::now()) == 0 {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    pub fn next(&mut self) {
        let len = self.row_count(Utc::now());
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 >= len => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count(Utc::now());
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Redeem the whole available balance
    pub fn redeem_all(&mut self) {
        let available = self.app.cashback_balance().available_balance;
        if available <= 0.0 {
            self.message = Some("No BONK cashback available for redemption".to_string());
            return;
        }

        self.message = Some(match self.app.redeem(available, "Manual Redemption") {
            Ok(tx) => format!("Redeemed ${:.2} BONK", tx.cashback_amount),
            Err(e) => {
                log::warn!("Redemption failed: {}", e);
                format!("Redemption failed: {}", e)
            }
        });
        self.reset_selection();
    }

    pub fn seed_demo_data(&mut self) {
        self.message = Some(match self.app.seed_demo_data() {
            Ok(()) => "Added sample cashback".to_string(),
            Err(e) => format!("Could not add samples: {}", e),
        });
        self.reset_selection();
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('r') if app.current_page == Page::Rewards => app.redeem_all(),
                KeyCode::Char('s') if app.current_page == Page::Rewards => app.seed_demo_data(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => app.reset_selection(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Page
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    let now = Utc::now();
    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Home => render_catalog(f, chunks[1], app),
        Page::Sleek => render_active(f, chunks[1], app, now),
        Page::Rewards => render_rewards(f, chunks[1], app),
        Page::Account => render_account(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app, now);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in PAGES.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let balance = app.app.cashback_balance();
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("BONK ${:.2}", balance.available_balance),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Sleek "),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn framed<'a>(table: Table<'a>, title: &'a str) -> Table<'a> {
    table
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ")
}

fn render_catalog(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .app
        .catalog()
        .all()
        .into_iter()
        .map(|sub| {
            let mut notes = Vec::new();
            if sub.estimated {
                notes.push("est.".to_string());
            }
            if let Some(region) = &sub.region {
                notes.push(region.clone());
            }

            Row::new(vec![
                Cell::from(truncate(&sub.category, 18)),
                Cell::from(truncate(&sub.name, 30)),
                Cell::from(format!("${:.2}", sub.price)),
                Cell::from(format!("{:.3} SOL", sub.sol_price)).style(Style::default().fg(Color::Cyan)),
                Cell::from(sub.period.as_str()),
                Cell::from(notes.join(" ")),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Min(6),
        ],
    )
    .header(header_row(&["Category", "Plan", "Price", "SOL", "Period", "Notes"]));

    f.render_stateful_widget(framed(table, " Catalog "), area, &mut app.state);
}

fn render_active(f: &mut Frame, area: Rect, app: &mut App, now: DateTime<Utc>) {
    let rows: Vec<Row> = app
        .app
        .active_subscriptions(now)
        .into_iter()
        .map(|sub| {
            let days = sub.days_remaining(now);
            let color = if days <= 7 { Color::Red } else { Color::Green };

            Row::new(vec![
                Cell::from(truncate(&sub.name, 30)),
                Cell::from(truncate(&sub.category, 18)),
                Cell::from(format!("{} days", days)).style(Style::default().fg(color)),
                Cell::from(sub.expires_at.format("%b %d, %Y").to_string()),
                Cell::from(format!("${:.2}", sub.price)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(20),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Plan", "Category", "Remaining", "Expires", "Price"]));

    f.render_stateful_widget(framed(table, " Active Subscriptions "), area, &mut app.state);
}

fn render_rewards(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let balance = app.app.cashback_balance();
    let stats = app.app.cashback_stats();
    let summary = vec![
        Line::from(vec![
            Span::styled("Available  ", Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("${:.2} BONK", balance.available_balance),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Earned     ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("${:.2}", balance.total_earned)),
            Span::raw("    "),
            Span::styled("Redeemed  ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("${:.2}", balance.total_redeemed)),
        ]),
        Line::from(vec![
            Span::styled("Pending    ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("${:.2}", balance.pending_balance)),
            Span::raw("    "),
            Span::styled("Average   ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("${:.2}", stats.average_cashback)),
        ]),
    ];

    let summary_panel = Paragraph::new(summary).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(" Cashback "),
    );
    f.render_widget(summary_panel, chunks[0]);

    let rows: Vec<Row> = app
        .app
        .cashback_transactions()
        .into_iter()
        .map(|tx| {
            let (sign, color) = if tx.is_earned() {
                ("+", Color::Green)
            } else {
                ("-", Color::Red)
            };

            Row::new(vec![
                Cell::from(tx.timestamp.format("%b %d, %Y %H:%M").to_string()),
                Cell::from(truncate(&tx.subscription_name, 30)),
                Cell::from(format!("{}{:.2}", sign, tx.cashback_amount)).style(Style::default().fg(color)),
                Cell::from(tx.transaction_type.as_str()),
                Cell::from(tx.status.as_str()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["When", "Subscription", "BONK", "Type", "Status"]));

    f.render_stateful_widget(framed(table, " Transactions "), chunks[1], &mut app.state);
}

fn render_account(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .app
        .order_history()
        .into_iter()
        .map(|item| {
            Row::new(vec![
                Cell::from(item.date.format("%b %d, %Y").to_string()),
                Cell::from(truncate(&item.subscription_name, 30)),
                Cell::from(format!("${:.2}", item.price)),
                Cell::from(format!("{:.3} SOL", item.sol_price)),
                Cell::from(format!("+{:.2}", item.cashback_earned)).style(Style::default().fg(Color::Green)),
                Cell::from(item.status),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Date", "Plan", "Price", "Paid", "BONK", "Status"]));

    f.render_stateful_widget(framed(table, " Order History "), area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.row_count(now);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    if app.current_page == Page::Rewards {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Redeem | "));
        status_spans.push(Span::styled("s", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Samples"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleek::{Store, WalletAddress};

    fn ui_app() -> App {
        let app = SleekApp::with_store(Store::open_in_memory().unwrap(), 0.1, LocalProgram::new()).unwrap();
        App::new(app)
    }

    #[test]
    fn test_page_cycle() {
        let mut page = Page::Home;
        for _ in 0..4 {
            page = page.next();
        }
        assert_eq!(page, Page::Home);
        assert_eq!(Page::Home.previous(), Page::Account);
        assert_eq!(Page::Rewards.title(), "Rewards");
    }

    #[test]
    fn test_selection_wraps() {
        let mut app = ui_app();
        let rows = app.row_count(Utc::now());
        assert!(rows > 0);
        assert_eq!(app.state.selected(), Some(0));

        app.previous();
        assert_eq!(app.state.selected(), Some(rows - 1));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_empty_page_has_no_selection() {
        let mut app = ui_app();
        app.next_page();
        assert_eq!(app.current_page, Page::Sleek);
        assert_eq!(app.state.selected(), None);
        app.next();
        assert_eq!(app.state.selected(), None);
    }

    #[test]
    fn test_redeem_all() {
        let mut app = ui_app();
        app.redeem_all();
        assert!(app.message.as_deref().unwrap().starts_with("No BONK"));

        let payer = WalletAddress::from_bytes([5u8; 32]);
        app.app.buy(Some(&payer), "Notion Plus").unwrap();
        app.redeem_all();
        assert_eq!(app.app.cashback_balance().available_balance, 0.0);
        assert_eq!(app.app.ledger().len(), 2);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Microsoft 365 Personal", 10), "Microso...");
    }
}
