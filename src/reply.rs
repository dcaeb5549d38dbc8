use std::convert::Infallible;

use serde::Serialize;
use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::{
    constants::SHOPPING_LIST_FILENAME,
    error::{Error, HtmlError},
    shopping::list::ShoppingList,
};

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Removal toggles answer 204 whether or not there was something to remove.
pub fn removed(_removed: bool) -> Response {
    no_content()
}

pub fn error_reply(error: &Error) -> Response {
    let status = StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_reply(error, status)
}

pub fn result_reply<T: Serialize>(result: Result<T, Error>, status: StatusCode) -> Response {
    match result {
        Ok(value) => json_reply(&value, status),
        Err(e) => error_reply(&e),
    }
}

/// Shopping list as a plain text attachment.
pub fn shopping_list_reply(list: &ShoppingList) -> Response {
    let reply = reply::with_header(
        list.render(),
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8",
    );
    reply::with_header(
        reply,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response()
}

/// Turns rejections into the same JSON error body actions return.
pub async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    let error = if let Some(error) = rejection.find::<Error>() {
        error.clone()
    } else if rejection.is_not_found() {
        HtmlError::NotFound.default()
    } else if let Some(missing) = rejection.find::<warp::reject::MissingHeader>() {
        HtmlError::Unauthorized.new(&format!("Missing header {}", missing.name()))
    } else if let Some(e) = rejection.find::<warp::body::BodyDeserializeError>() {
        HtmlError::InvalidRequest.new(&e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        HtmlError::InvalidRequest.new(&e.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        Error {
            code: 405,
            info: Some(String::from("Method not allowed")),
        }
    } else {
        log::error!("Unhandled rejection: {rejection:?}");
        HtmlError::InternalServerError.default()
    };

    Ok(error_reply(&error))
}
