//! Renders the finished extraction into the downloadable document: the
//! questions text (markdown, as the summarizer tends to produce) becomes a
//! standalone html page named after the lecture.

use axum::{
    http::header,
    response::{Html, IntoResponse, Response},
};

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn render(title: &str, description: Option<&str>, body: &str) -> Response {
    let mut questions_html = String::new();
    pulldown_cmark::html::push_html(&mut questions_html, pulldown_cmark::Parser::new(body));

    let description_html = match description {
        Some(description) if !description.is_empty() => {
            format!("<p>{}</p>\n", escape(description))
        }
        _ => String::new(),
    };

    let page = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>{title} - questions</title>\n</head>\n<body>\n\
         <h1>{title}</h1>\n{description_html}<h2>Generated Questions</h2>\n\
         {questions_html}</body>\n</html>",
        title = escape(title),
    );

    let filename: String = title
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\'))
        .collect();

    (
        [
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}-questions.html\""),
            ),
            (
                header::CONTENT_TYPE,
                "text/html; charset=utf-8".to_owned(),
            ),
        ],
        Html(page),
    )
        .into_response()
}
