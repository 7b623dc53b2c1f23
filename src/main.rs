mod app;
mod components;
mod image_pipeline;
mod message;
mod utils;
mod views;

fn main() -> iced::Result {
    app::run()
}
