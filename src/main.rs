mod classifier;
mod config;
mod errors;
mod handlers;
mod models;
mod preprocess;
mod service;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{error, info};

use classifier::OnnxClassifier;
use config::Settings;
use models::CATEGORIES;
use service::ClassificationService;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let settings = Settings::from_env().map_err(|e| {
        error!("{}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let classifier = OnnxClassifier::load(&settings.model_path, CATEGORIES.len()).map_err(|e| {
        error!("{}", errors::error_chain(&e));
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    let service = web::Data::new(ClassificationService::new(Arc::new(classifier)));
    let bind_address = settings.bind_address();
    let settings = web::Data::new(settings);

    info!(
        "Serving predictions for {:?} tensors at http://{}",
        service.preprocessor().tensor_shape(),
        bind_address
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(service.clone())
            .app_data(settings.clone())
            .configure(handlers::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
