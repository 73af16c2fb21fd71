use clap::Parser;
use gtk::prelude::*;
use gtk::Application;
use log::error;
use std::thread;

mod config;
mod fetch;
mod mpd_client;
mod scale;
mod ui;

use config::{Cli, Config};
use mpd_client::MPDClient;
use ui::ArtWindow;

const APP_ID: &str = "com.artbox.viewer";

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = match Config::load(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("artbox: {err:#}");
            std::process::exit(1);
        }
    };

    let app = Application::builder().application_id(APP_ID).build();
    app.connect_activate(move |app| build_ui(app, &config));
    // clap owns the command line, don't let GTK re-parse it
    app.run_with_args::<&str>(&[]);
}

fn build_ui(app: &Application, config: &Config) {
    let window = ArtWindow::new(app, &config.background_color);
    window.show();

    // Widgets stay on the GUI thread; the fetch thread only ever talks to
    // them through this channel.
    let (tx, rx) = glib::MainContext::channel(glib::Priority::DEFAULT);
    rx.attach(None, move |update| {
        window.apply(update);
        glib::ControlFlow::Continue
    });

    let host = config.host.clone();
    let port = config.port;
    thread::spawn(move || match MPDClient::connect(&host, port) {
        Ok(client) => fetch::run(client, tx),
        Err(err) => {
            error!("could not connect to mpd at {host}: {err:#}");
            std::process::exit(1);
        }
    });
}
