//! Public pages. Plain inline HTML; rendering is deliberately minimal.

use axum::response::Html;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{title} - confidant</title></head>\n\
         <body>\n{body}\n</body></html>"
    ))
}

pub async fn home() -> Html<String> {
    page(
        "Home",
        "<h1>confidant</h1>\n\
         <p>Share a secret. Anonymously.</p>\n\
         <ul>\n\
         <li><a href=\"/register\">Register</a></li>\n\
         <li><a href=\"/login\">Log in</a></li>\n\
         <li><a href=\"/secrets\">Browse secrets</a></li>\n\
         </ul>",
    )
}

pub async fn register_form() -> Html<String> {
    page(
        "Register",
        "<h1>Register</h1>\n\
         <form method=\"post\" action=\"/register\">\n\
         <label>Username <input name=\"username\" autocomplete=\"username\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"new-password\"></label>\n\
         <button type=\"submit\">Register</button>\n\
         </form>\n\
         <p><a href=\"/auth/google\">Sign up with Google</a> |\n\
         <a href=\"/auth/facebook\">Sign up with Facebook</a></p>",
    )
}

pub async fn login_form() -> Html<String> {
    page(
        "Log in",
        "<h1>Log in</h1>\n\
         <form method=\"post\" action=\"/login\">\n\
         <label>Username <input name=\"username\" autocomplete=\"username\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\n\
         <button type=\"submit\">Log in</button>\n\
         </form>\n\
         <p><a href=\"/auth/google\">Sign in with Google</a> |\n\
         <a href=\"/auth/facebook\">Sign in with Facebook</a></p>",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forms_post_to_their_own_paths() {
        let Html(register) = register_form().await;
        assert!(register.contains("action=\"/register\""));
        let Html(login) = login_form().await;
        assert!(login.contains("action=\"/login\""));
    }
}
