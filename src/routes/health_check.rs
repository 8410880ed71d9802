use actix_web::{get, HttpResponse, Responder};
use serde::Serialize;

#[derive(Serialize)]
struct Greeting {
    message: &'static str,
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[get("/hello")]
pub async fn hello() -> impl Responder {
    HttpResponse::Ok().json(Greeting {
        message: "Hello, World!",
    })
}
