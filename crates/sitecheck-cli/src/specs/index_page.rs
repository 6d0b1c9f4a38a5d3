use sitecheck::prelude::*;

pub fn suite() -> Suite {
    Suite::describe("Index Page")
        .test("should display all the index elements correctly", elements_loaded)
        .test(
            "should visually display all the index elements correctly",
            matches_screenshot,
        )
        .test(
            "should display message after clicking action button",
            shows_message_after_click,
        )
}

fn elements_loaded(f: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
    async move {
        f.index_page.goto().await?;
        f.index_page.assert_page_elements_loaded().await
    }
    .boxed()
}

fn matches_screenshot(f: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
    async move {
        f.index_page.goto().await?;
        f.index_page.assert_page_screenshot().await
    }
    .boxed()
}

fn shows_message_after_click(f: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
    async move {
        f.index_page.goto().await?;
        f.index_page.click_action_button().await?;
        f.index_page.assert_message_visible("Button clicked!").await
    }
    .boxed()
}
