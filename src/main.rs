use clap::Parser;
use color_eyre::Result;
use study_helper::{
    ChatAssistant, Config, FocusMode, Profile, TaskStore, VoiceAssistant,
    cli::{self, Cli, Commands},
    focus::LogOnlyBlocker,
    logging, utils,
    voice::ConsoleSpeech,
};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    // --config points at an explicit file; otherwise the profile's config dir is used
    let (mut config, config_path) = match cli.config.as_deref() {
        Some(path) => {
            let path = utils::expand_path(path);
            let mut config = if path.exists() {
                Config::load_from_path(&path)?
            } else {
                let mut config = Config::default();
                config.save_to_path(&path)?;
                config
            };
            config.apply_overrides(|key| std::env::var(key).ok())?;
            (config, path)
        }
        None => (Config::load_with_profile(profile)?, Config::get_config_path(profile)?),
    };

    if let Err(e) = logging::init(&config.logging.level, &config.get_log_path()) {
        eprintln!("Warning: logging disabled: {e}");
    }
    tracing::info!(?profile, config = %config_path.display(), "starting");

    let mut store = TaskStore::open(config.get_store_path());
    let mut focus = FocusMode::new(config.focus.enabled, &config.focus.blocked_sites, Box::new(LogOnlyBlocker));

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let chat = ChatAssistant::from_config(&config.chat)?;
            let app = study_helper::tui::App::new(config, config_path, store, focus, chat)?;
            study_helper::tui::run_event_loop(app)?;
        }
        Commands::Add { title, description, due, priority } => {
            cli::handle_add(title, description, due, priority, &mut store)?;
        }
        Commands::List { done, pending } => cli::handle_list(done, pending, &store)?,
        Commands::Done { id } => cli::handle_done(id, &mut store)?,
        Commands::Reopen { id } => cli::handle_reopen(id, &mut store)?,
        Commands::Edit(args) => cli::handle_edit(args, &mut store)?,
        Commands::Delete { id } => cli::handle_delete(id, &mut store)?,
        Commands::Today => cli::handle_today(&store)?,
        Commands::On { date } => cli::handle_on(&date, &store)?,
        Commands::Upcoming { days } => {
            cli::handle_upcoming(days.unwrap_or(config.schedule.upcoming_days), &store)?;
        }
        Commands::Week => cli::handle_week(&store)?,
        Commands::Schedule { slot, gap } => cli::handle_schedule(
            slot.unwrap_or(config.schedule.slot_minutes),
            gap.unwrap_or(config.schedule.gap_minutes),
            &store,
        )?,
        Commands::Stats => cli::handle_stats(&store)?,
        Commands::Chat { message } => {
            let mut chat = ChatAssistant::from_config(&config.chat)?;
            cli::handle_chat(message, &mut chat, &store)?;
        }
        Commands::Focus { action } => {
            cli::handle_focus(action, &mut config, &config_path, &mut focus)?;
        }
        Commands::Voice => {
            let mut chat = ChatAssistant::from_config(&config.chat)?;
            let mut voice = VoiceAssistant::new(
                Box::new(ConsoleSpeech::new()),
                config.voice.enabled,
                config.voice.wake_word.clone(),
            );
            cli::handle_voice(&mut voice, &config, &mut store, &mut focus, &mut chat)?;
        }
    }

    Ok(())
}
