//! The ordered rule table driving the parser. The first rule whose context matches a
//! pretoken decides everything done with it.
use crate::{
    model::SequenceType,
    options::{CustomTagKind, CustomTags},
    parser::trigger::{Field, LabelSpec, TriggerSpec},
    pretoken::{PreToken, PreTokenKind, Tag, TagPosition},
};

const HEADER_TAGS: &[&str] = &["id", "usfm", "ide", "h", "toc", "toca", "sts"];

const HEADING_TAGS: &[&str] = &[
    "s", "ms", "mr", "r", "sr", "sp", "d", "sd", "is", "iot", "cl", "cd", "qa",
];

const INTRODUCTION_TAGS: &[&str] = &[
    "ip", "ipi", "im", "imi", "ipq", "imq", "ipr", "iq", "ili", "ib", "io", "iex", "ie", "ipc",
];

const CELL_TAGS: &[&str] = &["th", "thr", "thc", "tc", "tcr", "tcc"];

const PARAGRAPH_TAGS: &[&str] = &[
    "p", "m", "po", "pr", "cls", "pmo", "pm", "pmc", "pmr", "pi", "mi", "nb", "pc", "ph", "q",
    "qr", "qc", "qm", "qd", "lh", "li", "lf", "lim", "lit", "b",
];

const NOTE_TAGS: &[&str] = &["f", "fe", "x", "ef", "ex"];

const NOTE_CHARACTER_TAGS: &[&str] = &[
    "fr", "fq", "fqa", "fk", "fl", "fw", "fp", "fv", "ft", "fdc", "fm", "xo", "xk", "xq", "xt",
    "xta", "xop", "xot", "xnt", "xdc",
];

const ATTRIBUTE_SPAN_TAGS: &[&str] = &["w", "rb", "jmp", "fig"];

const CHARACTER_TAGS: &[&str] = &[
    "add", "bk", "dc", "k", "nd", "ord", "pn", "png", "addpn", "qt", "sig", "sls", "tl", "wj",
    "em", "bd", "it", "bdit", "no", "sc", "sup", "ior", "iqt", "rq", "qac", "qs", "litl", "lik",
    "liv", "ca", "va", "vp", "cat", "ndx", "wg", "wh", "wa", "pro",
];

const END_SELF: TriggerSpec = TriggerSpec::Bound {
    prefix: "endTag",
    field: Field::FullTagName,
};

const BLOCK_TAG: LabelSpec = LabelSpec::new("blockTag", Field::FullTagName);

const SPAN: LabelSpec = LabelSpec::new("span", Field::FullTagName);

/// Block scopes of sequences other than main also end when we leave for another sequence.
const SIDE_BLOCK_SCOPES: &[ScopeSpec] = &[ScopeSpec {
    label: BLOCK_TAG,
    ended_by: &[
        TriggerSpec::Literal("baseSequenceChange"),
        TriggerSpec::Literal("endBlock"),
        END_SELF,
    ],
    on_end: None,
}];

const MAIN_BLOCK_SCOPES: &[ScopeSpec] = &[ScopeSpec {
    label: BLOCK_TAG,
    ended_by: &[TriggerSpec::Literal("endBlock"), END_SELF],
    on_end: None,
}];

const CELL_END: &[TriggerSpec] = &[
    TriggerSpec::Literal("startTag/th"),
    TriggerSpec::Literal("startTag/thr"),
    TriggerSpec::Literal("startTag/thc"),
    TriggerSpec::Literal("startTag/tc"),
    TriggerSpec::Literal("startTag/tcr"),
    TriggerSpec::Literal("startTag/tcc"),
    END_SELF,
    TriggerSpec::Literal("endBlock"),
    TriggerSpec::Literal("baseSequenceChange"),
];

const NOTE_END: &[TriggerSpec] = &[
    TriggerSpec::Literal("endTag/f"),
    TriggerSpec::Literal("endTag/fe"),
    TriggerSpec::Literal("endTag/x"),
    TriggerSpec::Literal("endTag/ef"),
    TriggerSpec::Literal("endTag/ex"),
    TriggerSpec::Literal("endBlock"),
];

const NOTE_CHARACTER_END: &[TriggerSpec] = &[
    TriggerSpec::Literal("startTag/fr"),
    TriggerSpec::Literal("startTag/fq"),
    TriggerSpec::Literal("startTag/fqa"),
    TriggerSpec::Literal("startTag/fk"),
    TriggerSpec::Literal("startTag/fl"),
    TriggerSpec::Literal("startTag/fw"),
    TriggerSpec::Literal("startTag/fp"),
    TriggerSpec::Literal("startTag/fv"),
    TriggerSpec::Literal("startTag/ft"),
    TriggerSpec::Literal("startTag/fdc"),
    TriggerSpec::Literal("startTag/fm"),
    TriggerSpec::Literal("startTag/xo"),
    TriggerSpec::Literal("startTag/xk"),
    TriggerSpec::Literal("startTag/xq"),
    TriggerSpec::Literal("startTag/xt"),
    TriggerSpec::Literal("startTag/xta"),
    TriggerSpec::Literal("startTag/xop"),
    TriggerSpec::Literal("startTag/xot"),
    TriggerSpec::Literal("startTag/xnt"),
    TriggerSpec::Literal("startTag/xdc"),
    TriggerSpec::Literal("endTag/f"),
    TriggerSpec::Literal("endTag/fe"),
    TriggerSpec::Literal("endTag/x"),
    TriggerSpec::Literal("endTag/ef"),
    TriggerSpec::Literal("endTag/ex"),
    END_SELF,
    TriggerSpec::Literal("endBlock"),
];

/// Where a pretoken's content goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceRoute {
    Main,
    /// Main, except that verse markers inside a table row stay in the row.
    MainUnlessTable,
    /// A block-level sequence grafted onto the next main block.
    Base(SequenceType),
    /// A footnote or cross-reference sequence grafted inline, typed by the note tag.
    Note,
}

impl SequenceRoute {
    pub(crate) fn note_type(tag: &Tag) -> SequenceType {
        match tag.name.as_str() {
            "x" | "ex" => SequenceType::Xref,
            _ => SequenceType::Footnote,
        }
    }
}

/// Side effect run when a scope closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnEnd {
    /// Store the sequence's text as the header named by the label.
    CaptureHeader,
    ReturnToBaseSequence,
    ClearAttributeContext,
}

/// What kind of scope an attribute context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeTarget {
    Span,
    Milestone,
    /// Attributes after a milestone end apply to nothing beyond their own `\*`.
    MilestoneEnd,
}

/// Composite behaviour run after scopes are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum During {
    /// One `verse/{n}` scope per number a verse marker names.
    ExplodeVerses,
    SetAttributeContext(AttributeTarget),
    /// Relabels the row just opened `tableRow/{n}`, counting from the table's first row.
    NumberTableRow,
    /// Opens and closes `milestone/{name}` at once and accepts attributes up to `\*`.
    EmptyMilestone,
    ClearMilestoneContext,
    OpenAttributeScopes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeSpec {
    pub(crate) label: LabelSpec,
    pub(crate) ended_by: &'static [TriggerSpec],
    pub(crate) on_end: Option<OnEnd>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Action {
    pub(crate) sequence: Option<SequenceRoute>,
    pub(crate) force_new_sequence: bool,
    pub(crate) use_temp_sequence: bool,
    pub(crate) new_block: bool,
    pub(crate) new_scopes: &'static [ScopeSpec],
    pub(crate) during: Option<During>,
}

impl Action {
    pub(crate) const NONE: Self = Self {
        sequence: None,
        force_new_sequence: false,
        use_temp_sequence: false,
        new_block: false,
        new_scopes: &[],
        during: None,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagNames {
    Listed(&'static [&'static str]),
    Custom(CustomTagKind),
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    Kind(PreTokenKind),
    Tag {
        position: TagPosition,
        names: TagNames,
    },
    Milestone {
        position: TagPosition,
        is_empty: bool,
    },
}

impl Context {
    fn matches(&self, pretoken: &PreToken, custom_tags: &CustomTags) -> bool {
        match (self, pretoken) {
            (Self::Kind(kind), _) => pretoken.kind() == *kind,
            (Self::Tag { position, names }, PreToken::Tag(tag)) => {
                tag.position == *position
                    && match names {
                        TagNames::Listed(listed) => {
                            listed.contains(&tag.name.as_str())
                                || listed.contains(&tag.full_name().as_str())
                        }
                        TagNames::Custom(kind) => {
                            custom_tags.kind_of(&tag.full_name()) == Some(*kind)
                                || custom_tags.kind_of(&tag.name) == Some(*kind)
                        }
                        TagNames::Any => true,
                    }
            }
            (
                Self::Milestone { position, is_empty },
                PreToken::Milestone {
                    position: p,
                    is_empty: e,
                    ..
                },
            ) => position == p && is_empty == e,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rule {
    pub(crate) description: &'static str,
    pub(crate) context: Context,
    pub(crate) action: Action,
}

const fn start_tags(names: &'static [&'static str]) -> Context {
    Context::Tag {
        position: TagPosition::Start,
        names: TagNames::Listed(names),
    }
}

const fn custom_start_tags(kind: CustomTagKind) -> Context {
    Context::Tag {
        position: TagPosition::Start,
        names: TagNames::Custom(kind),
    }
}

const fn side_sequence(sequence_type: SequenceType, force_new_sequence: bool) -> Action {
    Action {
        sequence: Some(SequenceRoute::Base(sequence_type)),
        force_new_sequence,
        new_block: true,
        new_scopes: SIDE_BLOCK_SCOPES,
        ..Action::NONE
    }
}

const PARAGRAPH: Action = Action {
    sequence: Some(SequenceRoute::Main),
    new_block: true,
    new_scopes: MAIN_BLOCK_SCOPES,
    ..Action::NONE
};

const HEADING: Action = side_sequence(SequenceType::Heading, true);

const CHARACTER: Action = Action {
    new_scopes: &[ScopeSpec {
        label: SPAN,
        ended_by: &[END_SELF, TriggerSpec::Literal("endBlock")],
        on_end: None,
    }],
    ..Action::NONE
};

pub(crate) static RULES: &[Rule] = &[
    Rule {
        description: "header",
        context: start_tags(HEADER_TAGS),
        action: Action {
            sequence: Some(SequenceRoute::Base(SequenceType::Header)),
            force_new_sequence: true,
            use_temp_sequence: true,
            new_block: true,
            new_scopes: &[ScopeSpec {
                label: BLOCK_TAG,
                ended_by: &[
                    TriggerSpec::Literal("baseSequenceChange"),
                    TriggerSpec::Literal("endBlock"),
                    END_SELF,
                ],
                on_end: Some(OnEnd::CaptureHeader),
            }],
            during: None,
        },
    },
    Rule {
        description: "remark",
        context: start_tags(&["rem"]),
        action: side_sequence(SequenceType::Remark, true),
    },
    Rule {
        description: "title",
        context: start_tags(&["mt"]),
        action: side_sequence(SequenceType::Title, false),
    },
    Rule {
        description: "end title",
        context: start_tags(&["mte"]),
        action: side_sequence(SequenceType::EndTitle, false),
    },
    Rule {
        description: "introduction title",
        context: start_tags(&["imt"]),
        action: side_sequence(SequenceType::IntroTitle, false),
    },
    Rule {
        description: "introduction end title",
        context: start_tags(&["imte"]),
        action: side_sequence(SequenceType::IntroEndTitle, false),
    },
    Rule {
        description: "heading",
        context: start_tags(HEADING_TAGS),
        action: HEADING,
    },
    Rule {
        description: "custom heading",
        context: custom_start_tags(CustomTagKind::Heading),
        action: HEADING,
    },
    Rule {
        description: "introduction paragraph",
        context: start_tags(INTRODUCTION_TAGS),
        action: side_sequence(SequenceType::Introduction, false),
    },
    Rule {
        description: "table row",
        context: start_tags(&["tr"]),
        action: Action {
            during: Some(During::NumberTableRow),
            ..side_sequence(SequenceType::Table, false)
        },
    },
    Rule {
        description: "table cell",
        context: start_tags(CELL_TAGS),
        action: Action {
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("tableCell", Field::Column),
                ended_by: CELL_END,
                on_end: None,
            }],
            ..Action::NONE
        },
    },
    Rule {
        description: "paragraph",
        context: start_tags(PARAGRAPH_TAGS),
        action: PARAGRAPH,
    },
    Rule {
        description: "custom paragraph",
        context: custom_start_tags(CustomTagKind::Paragraph),
        action: PARAGRAPH,
    },
    Rule {
        description: "note",
        context: start_tags(NOTE_TAGS),
        action: Action {
            sequence: Some(SequenceRoute::Note),
            force_new_sequence: true,
            new_block: true,
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("inline", Field::FullTagName),
                ended_by: NOTE_END,
                on_end: Some(OnEnd::ReturnToBaseSequence),
            }],
            ..Action::NONE
        },
    },
    Rule {
        description: "note character",
        context: start_tags(NOTE_CHARACTER_TAGS),
        action: Action {
            new_scopes: &[ScopeSpec {
                label: SPAN,
                ended_by: NOTE_CHARACTER_END,
                on_end: None,
            }],
            ..Action::NONE
        },
    },
    Rule {
        description: "character with attributes",
        context: start_tags(ATTRIBUTE_SPAN_TAGS),
        action: Action {
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("spanWithAtts", Field::FullTagName),
                ended_by: &[END_SELF, TriggerSpec::Literal("endBlock")],
                on_end: Some(OnEnd::ClearAttributeContext),
            }],
            during: Some(During::SetAttributeContext(AttributeTarget::Span)),
            ..Action::NONE
        },
    },
    Rule {
        description: "character",
        context: start_tags(CHARACTER_TAGS),
        action: CHARACTER,
    },
    Rule {
        description: "custom character",
        context: custom_start_tags(CustomTagKind::Character),
        action: CHARACTER,
    },
    Rule {
        description: "chapter",
        context: Context::Kind(PreTokenKind::Chapter),
        action: Action {
            sequence: Some(SequenceRoute::Main),
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("chapter", Field::Number),
                ended_by: &[TriggerSpec::Literal("chapter")],
                on_end: None,
            }],
            ..Action::NONE
        },
    },
    Rule {
        description: "printed chapter",
        context: Context::Kind(PreTokenKind::PrintChapter),
        action: Action {
            sequence: Some(SequenceRoute::Main),
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("pubChapter", Field::Number),
                ended_by: &[
                    TriggerSpec::Literal("chapter"),
                    TriggerSpec::Literal("pubChapter"),
                ],
                on_end: None,
            }],
            ..Action::NONE
        },
    },
    Rule {
        description: "verses",
        context: Context::Kind(PreTokenKind::Verses),
        action: Action {
            sequence: Some(SequenceRoute::MainUnlessTable),
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("verses", Field::Number),
                ended_by: VERSE_END,
                on_end: None,
            }],
            during: Some(During::ExplodeVerses),
            ..Action::NONE
        },
    },
    Rule {
        description: "milestone start",
        context: Context::Milestone {
            position: TagPosition::Start,
            is_empty: false,
        },
        action: Action {
            new_scopes: &[ScopeSpec {
                label: LabelSpec::new("milestone", Field::MilestoneName),
                ended_by: &[TriggerSpec::Bound {
                    prefix: "endMilestone",
                    field: Field::MilestoneName,
                }],
                on_end: None,
            }],
            during: Some(During::SetAttributeContext(AttributeTarget::Milestone)),
            ..Action::NONE
        },
    },
    Rule {
        description: "empty milestone",
        context: Context::Milestone {
            position: TagPosition::Start,
            is_empty: true,
        },
        action: Action {
            during: Some(During::EmptyMilestone),
            ..Action::NONE
        },
    },
    Rule {
        description: "milestone end",
        context: Context::Milestone {
            position: TagPosition::End,
            is_empty: false,
        },
        action: Action {
            during: Some(During::SetAttributeContext(AttributeTarget::MilestoneEnd)),
            ..Action::NONE
        },
    },
    Rule {
        description: "end of milestone attributes",
        context: Context::Kind(PreTokenKind::EndMilestoneMarker),
        action: Action {
            during: Some(During::ClearMilestoneContext),
            ..Action::NONE
        },
    },
    Rule {
        description: "attribute",
        context: Context::Kind(PreTokenKind::Attribute),
        action: Action {
            during: Some(During::OpenAttributeScopes),
            ..Action::NONE
        },
    },
    Rule {
        description: "end tag",
        context: Context::Tag {
            position: TagPosition::End,
            names: TagNames::Any,
        },
        action: Action::NONE,
    },
    Rule {
        description: "printable",
        context: Context::Kind(PreTokenKind::Printable),
        action: Action::NONE,
    },
    Rule {
        description: "break",
        context: Context::Kind(PreTokenKind::Break),
        action: Action::NONE,
    },
    Rule {
        description: "bad",
        context: Context::Kind(PreTokenKind::Bad),
        action: Action::NONE,
    },
];

/// Verse scopes, ranged or exploded, end at the next verse or chapter marker.
pub(crate) const VERSE_END: &[TriggerSpec] = &[
    TriggerSpec::Literal("verses"),
    TriggerSpec::Literal("chapter"),
];

/// The first rule matching `pretoken`, in table order.
pub(crate) fn find_rule(pretoken: &PreToken, custom_tags: &CustomTags) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.context.matches(pretoken, custom_tags))
}
