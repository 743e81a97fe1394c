//! Static travel knowledge base.
//!
//! A compact in-crate city catalog that the travel tools query through an
//! opaque interface. In production this would sit behind a real data
//! service; the built-in records are rich enough to exercise the full agent
//! loop end-to-end without network access.

use serde::Serialize;

/// One attraction inside a city record.
#[derive(Debug, Clone, Serialize)]
pub struct Attraction {
    pub name: &'static str,
    pub description: &'static str,
    /// Ticket price in CNY; 0 means free.
    pub ticket_price: u32,
    pub suggested_hours: f32,
}

/// One city record in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CityRecord {
    pub city: &'static str,
    pub region: &'static str,
    pub description: &'static str,
    /// Interest tags this city matches (e.g., "美食", "历史文化").
    pub tags: &'static [&'static str],
    /// Typical daily budget band in CNY (low, high).
    pub daily_budget: (u32, u32),
    pub best_seasons: &'static [&'static str],
    pub attractions: &'static [Attraction],
}

/// The full catalog, ordered north to south.
pub fn catalog() -> &'static [CityRecord] {
    CATALOG
}

/// Look up one city by exact name.
pub fn find_city(name: &str) -> Option<&'static CityRecord> {
    CATALOG.iter().find(|c| c.city == name)
}

/// All cities in a region.
pub fn cities_in_region(region: &str) -> Vec<&'static CityRecord> {
    CATALOG.iter().filter(|c| c.region == region).collect()
}

static CATALOG: &[CityRecord] = &[
    CityRecord {
        city: "北京",
        region: "华北",
        description: "六朝古都，历史遗迹与现代都市交织",
        tags: &["历史文化", "美食", "艺术"],
        daily_budget: (400, 900),
        best_seasons: &["春季", "秋季"],
        attractions: &[
            Attraction {
                name: "故宫",
                description: "明清两代皇宫，世界现存规模最大的木质结构古建筑群",
                ticket_price: 60,
                suggested_hours: 4.0,
            },
            Attraction {
                name: "长城（八达岭）",
                description: "明长城中保存最好、最具代表性的一段",
                ticket_price: 40,
                suggested_hours: 5.0,
            },
            Attraction {
                name: "颐和园",
                description: "皇家园林博物馆，昆明湖与万寿山相映",
                ticket_price: 30,
                suggested_hours: 3.0,
            },
        ],
    },
    CityRecord {
        city: "西安",
        region: "西北",
        description: "十三朝古都，丝绸之路起点",
        tags: &["历史文化", "美食"],
        daily_budget: (300, 600),
        best_seasons: &["春季", "秋季"],
        attractions: &[
            Attraction {
                name: "兵马俑",
                description: "秦始皇陵陪葬坑，被誉为世界第八大奇迹",
                ticket_price: 120,
                suggested_hours: 3.5,
            },
            Attraction {
                name: "古城墙",
                description: "中国现存规模最大、保存最完整的古代城垣",
                ticket_price: 54,
                suggested_hours: 2.5,
            },
            Attraction {
                name: "回民街",
                description: "西安风味美食与小吃最集中的街区",
                ticket_price: 0,
                suggested_hours: 2.0,
            },
        ],
    },
    CityRecord {
        city: "上海",
        region: "华东",
        description: "国际都会，万国建筑与摩天楼隔江相望",
        tags: &["现代都市", "美食", "艺术", "购物"],
        daily_budget: (500, 1200),
        best_seasons: &["春季", "秋季"],
        attractions: &[
            Attraction {
                name: "外滩",
                description: "黄浦江畔的万国建筑博览群",
                ticket_price: 0,
                suggested_hours: 2.0,
            },
            Attraction {
                name: "豫园",
                description: "明代古典园林，毗邻城隍庙小吃街",
                ticket_price: 40,
                suggested_hours: 2.5,
            },
            Attraction {
                name: "上海博物馆",
                description: "青铜、陶瓷、书画馆藏俱佳的综合性博物馆",
                ticket_price: 0,
                suggested_hours: 3.0,
            },
        ],
    },
    CityRecord {
        city: "杭州",
        region: "华东",
        description: "上有天堂，下有苏杭；湖光山色与茶文化",
        tags: &["自然风光", "历史文化", "休闲"],
        daily_budget: (350, 700),
        best_seasons: &["春季", "秋季"],
        attractions: &[
            Attraction {
                name: "西湖",
                description: "三面云山一面城，苏堤白堤贯穿湖面",
                ticket_price: 0,
                suggested_hours: 4.0,
            },
            Attraction {
                name: "灵隐寺",
                description: "江南禅宗名刹，飞来峰造像群",
                ticket_price: 75,
                suggested_hours: 2.5,
            },
            Attraction {
                name: "龙井村",
                description: "西湖龙井原产地，茶园漫步与品茶",
                ticket_price: 0,
                suggested_hours: 2.0,
            },
        ],
    },
    CityRecord {
        city: "成都",
        region: "西南",
        description: "天府之国，悠闲生活与麻辣美食之都",
        tags: &["美食", "休闲", "自然风光"],
        daily_budget: (300, 600),
        best_seasons: &["春季", "秋季", "冬季"],
        attractions: &[
            Attraction {
                name: "大熊猫繁育研究基地",
                description: "近距离观察大熊猫的科研保护机构",
                ticket_price: 55,
                suggested_hours: 3.0,
            },
            Attraction {
                name: "宽窄巷子",
                description: "清代古街区，茶馆与川味小吃聚集地",
                ticket_price: 0,
                suggested_hours: 2.0,
            },
            Attraction {
                name: "都江堰",
                description: "两千年前的水利工程，至今仍在使用",
                ticket_price: 80,
                suggested_hours: 3.5,
            },
        ],
    },
    CityRecord {
        city: "广州",
        region: "华南",
        description: "千年商都，粤菜与早茶文化的发源地",
        tags: &["美食", "现代都市", "购物"],
        daily_budget: (350, 750),
        best_seasons: &["秋季", "冬季"],
        attractions: &[
            Attraction {
                name: "陈家祠",
                description: "岭南建筑艺术明珠，砖雕木雕荟萃",
                ticket_price: 10,
                suggested_hours: 2.0,
            },
            Attraction {
                name: "沙面岛",
                description: "欧陆风情建筑街区，江畔漫步胜地",
                ticket_price: 0,
                suggested_hours: 2.0,
            },
            Attraction {
                name: "广州塔",
                description: "珠江新城地标，俯瞰全城夜景",
                ticket_price: 150,
                suggested_hours: 2.0,
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_city_names() {
        let mut names: Vec<&str> = catalog().iter().map(|c| c.city).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn every_city_has_attractions_and_budget_band() {
        for city in catalog() {
            assert!(!city.attractions.is_empty(), "{} has no attractions", city.city);
            assert!(city.daily_budget.0 < city.daily_budget.1);
            assert!(!city.best_seasons.is_empty());
        }
    }

    #[test]
    fn find_city_exact_match() {
        assert!(find_city("成都").is_some());
        assert!(find_city("atlantis").is_none());
    }

    #[test]
    fn region_lookup() {
        let east = cities_in_region("华东");
        assert_eq!(east.len(), 2);
    }
}
