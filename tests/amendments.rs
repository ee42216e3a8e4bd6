use chrono::{Datelike, NaiveDate};
use legal_xref::amendments::{
    extract_amending_statutes, extract_section_amendments, find_changed_sections,
    group_amendments_by_statute, parse_transitional_provisions, parse_undertitel,
};

const ARBETSMILJOLAG: &str = "Arbetsmiljölag (1977:1160)

1 § Lagens ändamål är att förebygga ohälsa och olycksfall i arbetet samt att även i övrigt uppnå en god arbetsmiljö. Lag (2014:659).

2 § Denna lag gäller varje verksamhet i vilken arbetstagare utför arbete för en arbetsgivares räkning. Lag (2014:659).

3 § Arbete ska planläggas och anordnas så, att det kan utföras i en sund och säker miljö. Lag (2014:659).

Övergångsbestämmelser

2014:659
Denna lag träder i kraft den 1 juli 2014.";

#[test]
fn undertitel_names_latest_amendment() {
    assert_eq!(
        parse_undertitel("t.o.m. SFS 2025:732").as_deref(),
        Some("STATUTE 2025:732")
    );
    assert_eq!(
        parse_undertitel("t.o.m. SFS 2000:1").as_deref(),
        Some("STATUTE 2000:1")
    );
    assert_eq!(
        parse_undertitel("t.o.m. SFS 2025:100, SFS 2024:50").as_deref(),
        Some("STATUTE 2025:100")
    );
    for text in ["", "SFS 2024:123", "ändr. SFS 2023:456", "Some other text"] {
        assert_eq!(parse_undertitel(text), None, "{text}");
    }
}

#[test]
fn extracts_section_amendments() {
    let text = "1 § Denna lag innehåller bestämmelser om... Lag (2020:100).

2 § Lagen tillämpas på... Lag (2021:200).";
    let result = extract_section_amendments(text);
    let numbers: Vec<&str> = result
        .amendments
        .iter()
        .map(|a| a.section_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["1", "2"]);
    assert_eq!(
        result.amending_statutes,
        vec!["STATUTE 2020:100".to_string(), "STATUTE 2021:200".to_string()]
    );
}

#[test]
fn chapter_sections_carry_their_chapter() {
    let text = "1 kap. 1 § Denna lag innehåller... Lag (2020:100).

2 kap. 1 § Detta kapitel tillämpas... Lag (2021:200).";
    let result = extract_section_amendments(text);
    assert_eq!(result.amendments.len(), 2);
    assert_eq!(result.amendments[0].section_number, "1:1");
    assert_eq!(result.amendments[0].chapter_number.as_deref(), Some("1"));
    assert_eq!(result.amendments[1].section_number, "2:1");
    assert_eq!(result.amendments[1].amended_by, "STATUTE 2021:200");
}

#[test]
fn lettered_sections_are_kept_apart() {
    let text = "1 § First section. Lag (2020:100).

1 a § First-a section. Lag (2020:200).

1 b § First-b section. Lag (2021:300).";
    let numbers: Vec<String> = extract_section_amendments(text)
        .amendments
        .into_iter()
        .map(|a| a.section_number)
        .collect();
    assert_eq!(numbers, vec!["1", "1 a", "1 b"]);
}

#[test]
fn text_without_markers_has_no_amendments() {
    for text in ["", "Just some plain text without sections."] {
        let result = extract_section_amendments(text);
        assert!(result.amendments.is_empty());
        assert!(result.amending_statutes.is_empty());
    }
}

#[test]
fn section_text_keeps_swedish_characters() {
    let result = extract_section_amendments(
        "1 § Bestämmelser om övergångsperiod för äldre föreskrifter. Lag (2020:100).",
    );
    assert_eq!(result.amendments.len(), 1);
    assert_eq!(
        result.amendments[0].section_text,
        "Bestämmelser om övergångsperiod för äldre föreskrifter."
    );
}

#[test]
fn finds_sections_changed_by_one_statute() {
    let text = "1 § First section. Lag (2020:100).

2 § Second section. Lag (2020:100).

3 § Third section. Lag (2021:200).";
    assert_eq!(
        find_changed_sections(text, "STATUTE 2020:100"),
        vec!["1 §".to_string(), "2 §".to_string()]
    );
    assert!(find_changed_sections(text, "2020:100").is_empty());
    assert!(find_changed_sections(text, "STATUTE 2025:999").is_empty());

    let chapters = "1 kap. 1 § First chapter first section. Lag (2020:100).

2 kap. 1 § Second chapter first section. Lag (2020:100).";
    assert_eq!(
        find_changed_sections(chapters, "STATUTE 2020:100"),
        vec!["1:1 §".to_string(), "2:1 §".to_string()]
    );
}

#[test]
fn lists_amending_statutes_once() {
    let text = "This law references Lag (2020:100) and also Lag (2021:200).
Later it mentions Lag (2020:100) again and Lag (2022:300). See SFS 2019:1 too.";
    assert_eq!(
        extract_amending_statutes(text),
        vec![
            "STATUTE 2020:100".to_string(),
            "STATUTE 2021:200".to_string(),
            "STATUTE 2022:300".to_string(),
        ]
    );
    assert!(extract_amending_statutes("").is_empty());
}

#[test]
fn reads_entry_into_force_dates() {
    let dates = parse_transitional_provisions(
        "Normal law text here...

Övergångsbestämmelser

2020:100
Denna lag träder i kraft den 1 januari 2021.",
    );
    assert_eq!(
        dates.get("STATUTE 2020:100"),
        NaiveDate::from_ymd_opt(2021, 1, 1).as_ref()
    );

    assert!(parse_transitional_provisions("Just normal law text.").is_empty());
}

#[test]
fn understands_every_swedish_month() {
    let months = [
        "januari", "februari", "mars", "april", "maj", "juni", "juli", "augusti",
        "september", "oktober", "november", "december",
    ];
    for (index, name) in months.iter().enumerate() {
        let number = index + 1;
        let text = format!(
            "Övergångsbestämmelser\n\n2023:{number}\nDenna lag träder i kraft den 15 {name} 2024."
        );
        let dates = parse_transitional_provisions(&text);
        let date = dates[&format!("STATUTE 2023:{number}")];
        assert_eq!(date.month() as usize, number, "{name}");
        assert_eq!(date.day(), 15);
        assert_eq!(date.year(), 2024);
    }
}

#[test]
fn groups_sections_by_amending_statute() {
    let text = "1 § First. Lag (2020:100).

2 § Second. Lag (2020:100).

3 § Third. Lag (2021:200).";
    let grouped = group_amendments_by_statute(text);
    assert_eq!(grouped["STATUTE 2020:100"], vec!["1 §", "2 §"]);
    assert_eq!(grouped["STATUTE 2021:200"], vec!["3 §"]);
}

#[test]
fn realistic_statute_text() {
    let amendments = extract_section_amendments(ARBETSMILJOLAG);
    assert_eq!(amendments.amendments.len(), 3);
    assert_eq!(amendments.amending_statutes, vec!["STATUTE 2014:659".to_string()]);
    assert_eq!(
        find_changed_sections(ARBETSMILJOLAG, "STATUTE 2014:659"),
        vec!["1 §", "2 §", "3 §"]
    );
    assert_eq!(
        parse_transitional_provisions(ARBETSMILJOLAG).get("STATUTE 2014:659"),
        NaiveDate::from_ymd_opt(2014, 7, 1).as_ref()
    );
}
