use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::articles::ArticleStore;
use crate::auth::{MutationGuard, SessionFilter, SubscriptionAuthenticator, TokenCodec};
use crate::configuration::SessionSettings;
use crate::identity::{IdentityStore, StoreResolver, TrackerResolver};
use crate::logger::LoggerMiddleware;
use crate::middleware::{MutationMiddleware, SessionMiddleware};
use crate::pubsub::EventHub;
use crate::routes::{
    create_article, current_member, forget, health_check, list_articles, member_by_handle,
    mutation_probe, ping, refresh, subscribe,
};

pub fn run(
    listener: TcpListener,
    settings: SessionSettings,
    store: Arc<dyn IdentityStore>,
) -> Result<Server, std::io::Error> {
    let codec = Arc::new(TokenCodec::from_settings(&settings));
    let resolver: Arc<dyn TrackerResolver> = Arc::new(StoreResolver::with_cache(
        store.clone(),
        settings.store_timeout(),
        settings.cache_capacity,
        settings.cache_ttl(),
    ));
    let filter = Arc::new(SessionFilter::from_settings(&settings, codec.clone(), resolver));
    let guard = MutationGuard::new(codec.clone());
    let authenticator =
        SubscriptionAuthenticator::new(codec, store.clone(), settings.store_timeout());
    let hub = Arc::new(EventHub::default());
    let articles = ArticleStore::new(hub.clone());

    // Shared state
    let store_data: web::Data<dyn IdentityStore> = web::Data::from(store);
    let filter_data = web::Data::from(filter.clone());
    let hub_data = web::Data::from(hub);
    let settings_data = web::Data::new(settings);
    let authenticator_data = web::Data::new(authenticator);
    let articles_data = web::Data::new(articles);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(LoggerMiddleware)
            .app_data(store_data.clone())
            .app_data(filter_data.clone())
            .app_data(hub_data.clone())
            .app_data(settings_data.clone())
            .app_data(authenticator_data.clone())
            .app_data(articles_data.clone())
            // Public routes (no cookies read or written)
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(subscribe))
            // Session routes (cookies associated and refreshed)
            .service(
                web::scope("/api")
                    .wrap(SessionMiddleware::new(filter.clone()))
                    .route("/refresh", web::get().to(refresh))
                    .route("/articles", web::get().to(list_articles))
                    .route("/members/me", web::get().to(current_member))
                    .route("/members/{handle}", web::get().to(member_by_handle))
                    .service(
                        web::scope("/mutations")
                            .wrap(MutationMiddleware::new(guard.clone()))
                            .route("/articles", web::post().to(create_article))
                            .route("/forget", web::post().to(forget)),
                    ),
            )
            .service(
                web::scope("/test")
                    .wrap(SessionMiddleware::new(filter.clone()))
                    .route("/ping", web::get().to(ping))
                    .service(
                        web::scope("/mutation")
                            .wrap(MutationMiddleware::new(guard.clone()))
                            .route("", web::get().to(mutation_probe)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
