pub mod app;
pub mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use taskdeck_core::{Dispatcher, Outbound, ReconcileStrategy, TaskApi};
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::tui::app::{App, InputMode};

fn restore_terminal_on_panic() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        default_hook(info);
    }));
}

pub fn run<A: TaskApi + 'static>(handle: Handle, api: A, strategy: ReconcileStrategy) -> Result<()> {
    restore_terminal_on_panic();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(strategy);
    let mut dispatcher = Dispatcher::new(handle, Arc::new(api));
    info!(%strategy, "tui started");
    let res = run_app(&mut terminal, &mut app, &mut dispatcher);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "tui exited with an error");
        println!("{:?}", err);
    }
    info!(abandoned = dispatcher.in_flight(), "tui stopped");

    Ok(())
}

fn run_app<B: Backend, A: TaskApi + 'static>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    dispatcher: &mut Dispatcher<A>,
) -> io::Result<()> {
    dispatcher.dispatch(app.start());

    loop {
        while let Some(completion) = dispatcher.try_next() {
            if let Some(next) = app.apply(completion) {
                dispatcher.dispatch(next);
            }
        }

        terminal.draw(|f| ui::draw(f, app))
            .map_err(|e| io::Error::other(e.to_string()))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(outbound) = handle_key(app, key) {
                    dispatcher.dispatch(outbound);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Option<Outbound> {
    match app.input_mode() {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => {
                app.should_quit = true;
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.next();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.previous();
                None
            }
            KeyCode::Char(' ') => app.toggle_status(),
            KeyCode::Char('s') => app.advance_status(),
            KeyCode::Char('e') | KeyCode::Enter => {
                app.enter_edit_mode();
                None
            }
            KeyCode::Char('a') => {
                app.enter_add_mode();
                None
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                app.request_delete();
                None
            }
            KeyCode::Char('g') => Some(app.refresh()),
            KeyCode::Char('r') => app.retry(),
            KeyCode::Char('x') => {
                app.dismiss_error();
                None
            }
            _ => None,
        },
        InputMode::ConfirmDelete => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_delete(false),
            _ => None,
        },
        InputMode::Form => {
            match key.code {
                KeyCode::Enter => return app.submit_form(),
                KeyCode::Esc => app.cancel_form(),
                KeyCode::Tab | KeyCode::Down => app.next_field(),
                KeyCode::BackTab | KeyCode::Up => app.previous_field(),
                KeyCode::Char(c) => app.input_char(c),
                KeyCode::Backspace => app.delete_char(),
                KeyCode::Left => app.move_cursor_left(),
                KeyCode::Right => app.move_cursor_right(),
                _ => {}
            }
            None
        }
    }
}
