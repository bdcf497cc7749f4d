#![forbid(unsafe_code)]

//! Built-in server markup and list data used when no files are given.

pub const DEFAULT_PAGE: &str = r#"<main id="app">
  <lean-state id="display" topic="Markets" axis="liberal-conservative">
    <article-content data-axis="liberal-conservative" data-level="0">
      <p>Central bank holds rates; analysts <span data-variants="0:see a pause|-2:warn of hardship|2:praise restraint">see a pause</span>.</p>
      <ul data-sources><li><a href="https://example.org/wire">Wire report</a></li></ul>
    </article-content>
  </lean-state>
  <lean-selector id="selector"></lean-selector>
  <lean-card id="card" title="Housing outlook" summary="0:Prices flat|-2:Rents squeeze families|2:Owners hold value" tags="housing, economy"></lean-card>
  <lean-list id="headlines" title="Headlines" delay-ms="300"></lean-list>
</main>"#;

pub const DEFAULT_ITEMS: &str = r#"[
  {"title": "Rates unchanged", "category": "economy", "variants": "0:Rates unchanged|-2:Borrowers wait longer|2:Discipline pays off"},
  {"title": "Storm season opens", "category": "weather"},
  {"title": "Payrolls beat forecasts", "category": "economy"}
]"#;
